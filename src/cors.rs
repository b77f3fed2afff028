use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{ServiceRequest, ServiceResponse},
    http::{
        header::{self, HeaderValue},
        Method,
    },
    middleware::Next,
    web, Error, HttpResponse,
};
use log::warn;

pub const ALLOWED_METHODS: &str = "GET, POST, PATCH, DELETE";
pub const DEFAULT_ALLOWED_HEADERS: &str = "Content-Type";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginDecision {
    SameOrigin,
    Allowed(String),
    Denied,
}

impl OriginDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, OriginDecision::Denied)
    }
}

#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        OriginPolicy {
            allowed: origins.into_iter().map(Into::into).collect(),
        }
    }

    pub fn evaluate(&self, origin: Option<&str>) -> OriginDecision {
        match origin {
            None => OriginDecision::SameOrigin,
            Some(origin) if self.allowed.iter().any(|allowed| allowed == origin) => {
                OriginDecision::Allowed(origin.to_owned())
            }
            Some(_) => OriginDecision::Denied,
        }
    }

    pub fn evaluate_headers(&self, headers: &header::HeaderMap) -> OriginDecision {
        match headers.get(header::ORIGIN) {
            None => OriginDecision::SameOrigin,
            Some(value) => match value.to_str() {
                Ok(origin) => self.evaluate(Some(origin)),
                Err(_) => OriginDecision::Denied,
            },
        }
    }
}

fn is_simple(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD || *method == Method::OPTIONS
}

pub async fn enforce<B: MessageBody>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    let decision = match req.app_data::<web::Data<OriginPolicy>>() {
        Some(policy) => policy.evaluate_headers(req.headers()),
        None => OriginDecision::SameOrigin,
    };

    if decision == OriginDecision::Denied && !is_simple(req.method()) {
        warn!(
            "rejected {} {} from origin {:?}",
            req.method(),
            req.path(),
            req.headers().get(header::ORIGIN)
        );
        let res = req.into_response(HttpResponse::Forbidden().finish());
        return Ok(res.map_into_right_body());
    }

    let mut res = next.call(req).await?;
    if let OriginDecision::Allowed(origin) = decision {
        if let Ok(value) = HeaderValue::from_str(&origin) {
            let headers = res.headers_mut();
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
            headers.insert(header::VARY, HeaderValue::from_static("Origin"));
        }
    }
    Ok(res.map_into_left_body())
}
