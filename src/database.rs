use crate::model::*;
use crate::schema::{self, ValidationErrors};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

const SEED_MOVIES: &str = include_str!("../data/movies.json");

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("movie {0} does not exist")]
    NotFound(String),
    #[error("no genre was supplied")]
    MissingGenre,
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("seed data is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("seed data must be a JSON array of movies")]
    NotAnArray,
    #[error("seed movie #{0} has no string id")]
    MissingId(usize),
    #[error("seed movie #{index} is invalid: {source}")]
    Invalid {
        index: usize,
        source: ValidationErrors,
    },
    #[error("seed movie id {0} appears more than once")]
    DuplicateId(String),
}

pub trait MovieDb {
    type Error;
    fn list_all(&self) -> Vec<Movie>;
    fn find_by_id(&self, id: &str) -> Result<Movie, Self::Error>;
    fn filter_by_genre(&self, genre: Option<&str>) -> Result<Vec<Movie>, Self::Error>;
    fn create(&self, movie: NewMovie) -> Movie;
    fn update_partial(&self, id: &str, patch: MoviePatch) -> Result<Movie, Self::Error>;
    fn delete(&self, id: &str) -> Result<Movie, Self::Error>;
}

#[derive(Debug, Default)]
pub struct MovieStore {
    movies: RwLock<Vec<Movie>>,
}

impl MovieStore {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded() -> Result<Self, SeedError> {
        Self::from_json(SEED_MOVIES)
    }

    pub fn from_json(json: &str) -> Result<Self, SeedError> {
        let raw: Value = serde_json::from_str(json)?;
        let records = raw.as_array().ok_or(SeedError::NotAnArray)?;

        let mut seen = HashSet::new();
        let mut movies = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let id = record
                .get("id")
                .and_then(Value::as_str)
                .ok_or(SeedError::MissingId(index))?
                .to_owned();
            let movie = schema::validate_movie(record)
                .map_err(|source| SeedError::Invalid { index, source })?;
            if !seen.insert(id.clone()) {
                return Err(SeedError::DuplicateId(id));
            }
            movies.push(movie.into_movie(id));
        }

        Ok(MovieStore {
            movies: RwLock::new(movies),
        })
    }

    pub fn len(&self) -> usize {
        self.movies.read().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.movies.read().is_empty()
    }
}

fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl MovieDb for MovieStore {
    type Error = StoreError;

    fn list_all(&self) -> Vec<Movie> {
        self.movies.read().clone()
    }

    fn find_by_id(&self, id: &str) -> Result<Movie, StoreError> {
        self.movies
            .read()
            .iter()
            .find(|movie| movie.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_owned()))
    }

    fn filter_by_genre(&self, genre: Option<&str>) -> Result<Vec<Movie>, StoreError> {
        let genre = match genre {
            Some(genre) if !genre.is_empty() => genre,
            _ => return Err(StoreError::MissingGenre),
        };
        Ok(self
            .movies
            .read()
            .iter()
            .filter(|movie| movie.has_genre_ignore_case(genre))
            .cloned()
            .collect())
    }

    fn create(&self, movie: NewMovie) -> Movie {
        let mut movies = self.movies.write();
        let mut id = generate_id();
        while movies.iter().any(|existing| existing.id == id) {
            id = generate_id();
        }
        let movie = movie.into_movie(id);
        movies.push(movie.clone());
        movie
    }

    fn update_partial(&self, id: &str, patch: MoviePatch) -> Result<Movie, StoreError> {
        let mut movies = self.movies.write();
        let movie = movies
            .iter_mut()
            .find(|movie| movie.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_owned()))?;
        patch.apply(movie);
        Ok(movie.clone())
    }

    fn delete(&self, id: &str) -> Result<Movie, StoreError> {
        let mut movies = self.movies.write();
        let index = movies
            .iter()
            .position(|movie| movie.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_owned()))?;
        Ok(movies.remove(index))
    }
}
