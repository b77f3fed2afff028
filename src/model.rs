use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Genre {
    Drama,
    Action,
    Crime,
    Adventure,
    #[serde(rename = "Sci-Fi")]
    SciFi,
    Romance,
    Animation,
    Biography,
    Fantasy,
}

impl Genre {
    pub const ALL: [Genre; 9] = [
        Genre::Drama,
        Genre::Action,
        Genre::Crime,
        Genre::Adventure,
        Genre::SciFi,
        Genre::Romance,
        Genre::Animation,
        Genre::Biography,
        Genre::Fantasy,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Genre::Drama => "Drama",
            Genre::Action => "Action",
            Genre::Crime => "Crime",
            Genre::Adventure => "Adventure",
            Genre::SciFi => "Sci-Fi",
            Genre::Romance => "Romance",
            Genre::Animation => "Animation",
            Genre::Biography => "Biography",
            Genre::Fantasy => "Fantasy",
        }
    }

    pub fn from_name(name: &str) -> Option<Genre> {
        Genre::ALL.iter().copied().find(|genre| genre.name() == name)
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Movie {
    pub id: String,
    pub title: String,
    pub year: u16,
    pub director: String,
    pub duration: u32,
    pub poster: String,
    pub genre: Vec<Genre>,
    #[serde(serialize_with = "serialize_rate")]
    pub rate: f64,
}

// Whole-number rates serialize as JSON integers.
fn serialize_rate<S: Serializer>(rate: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if rate.fract() == 0.0 && *rate >= 0.0 && *rate <= u32::MAX as f64 {
        serializer.serialize_u64(*rate as u64)
    } else {
        serializer.serialize_f64(*rate)
    }
}

impl Movie {
    pub fn has_genre_ignore_case(&self, genre: &str) -> bool {
        self.genre
            .iter()
            .any(|g| g.name().eq_ignore_ascii_case(genre))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMovie {
    pub title: String,
    pub year: u16,
    pub director: String,
    pub duration: u32,
    pub poster: String,
    pub genre: Vec<Genre>,
    pub rate: f64,
}

impl NewMovie {
    pub fn into_movie(self, id: String) -> Movie {
        Movie {
            id,
            title: self.title,
            year: self.year,
            director: self.director,
            duration: self.duration,
            poster: self.poster,
            genre: self.genre,
            rate: self.rate,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoviePatch {
    pub title: Option<String>,
    pub year: Option<u16>,
    pub director: Option<String>,
    pub duration: Option<u32>,
    pub poster: Option<String>,
    pub genre: Option<Vec<Genre>>,
    pub rate: Option<f64>,
}

impl MoviePatch {
    pub fn apply(self, movie: &mut Movie) {
        if let Some(title) = self.title {
            movie.title = title;
        }
        if let Some(year) = self.year {
            movie.year = year;
        }
        if let Some(director) = self.director {
            movie.director = director;
        }
        if let Some(duration) = self.duration {
            movie.duration = duration;
        }
        if let Some(poster) = self.poster {
            movie.poster = poster;
        }
        if let Some(genre) = self.genre {
            movie.genre = genre;
        }
        if let Some(rate) = self.rate {
            movie.rate = rate;
        }
    }
}
