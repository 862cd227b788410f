use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage, HttpResponse,
};
use crypto_core::jwt::{bearer_token, JwtError, JwtKeys};
use futures::future::{ready, Ready};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use uuid::Uuid;

/// User ID extracted from a verified bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

/// Rejection reasons, rendered with the same body shape the services use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    /// No usable `Authorization: Bearer` header
    Unauthenticated,
    /// Signature, expiry or subject check failed
    InvalidCredential,
}

impl Rejection {
    fn code(self) -> &'static str {
        match self {
            Rejection::Unauthenticated => "UNAUTHENTICATED",
            Rejection::InvalidCredential => "INVALID_CREDENTIAL",
        }
    }

    fn message(self) -> &'static str {
        match self {
            Rejection::Unauthenticated => "missing or malformed bearer credential",
            Rejection::InvalidCredential => "invalid credential",
        }
    }

    fn response(self) -> HttpResponse {
        HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Unauthorized",
            "message": self.message(),
            "status": 401,
            "type": "authentication_error",
            "code": self.code(),
        }))
    }

    fn into_error(self) -> Error {
        actix_web::error::InternalError::from_response(self.message(), self.response()).into()
    }
}

/// JWT Authentication Middleware
///
/// Verifies the bearer token and stores the subject as [`UserId`] in the
/// request extensions. Whether the subject still exists is left to the
/// handler's extractor.
#[derive(Clone)]
pub struct JwtAuthMiddleware {
    keys: Arc<JwtKeys>,
}

impl JwtAuthMiddleware {
    pub fn new(keys: Arc<JwtKeys>) -> Self {
        Self { keys }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = JwtAuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddlewareService {
            service: Rc::new(service),
            keys: self.keys.clone(),
        }))
    }
}

pub struct JwtAuthMiddlewareService<S> {
    service: Rc<S>,
    keys: Arc<JwtKeys>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let keys = self.keys.clone();

        Box::pin(async move {
            let token = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(bearer_token)
                .map(str::to_owned);

            let Some(token) = token else {
                return Ok(req
                    .into_response(Rejection::Unauthenticated.response())
                    .map_into_right_body());
            };

            let user_id = match keys.user_id(&token) {
                Ok(user_id) => user_id,
                Err(e) => {
                    match &e {
                        JwtError::Expired => tracing::debug!("rejected expired token"),
                        other => tracing::warn!("JWT validation failed: {}", other),
                    }
                    return Ok(req
                        .into_response(Rejection::InvalidCredential.response())
                        .map_into_right_body());
                }
            };

            req.extensions_mut().insert(UserId(user_id));

            service
                .call(req)
                .await
                .map(ServiceResponse::map_into_left_body)
        })
    }
}

/// FromRequest implementation for UserId
impl actix_web::FromRequest for UserId {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(
        req: &actix_web::HttpRequest,
        _payload: &mut actix_web::dev::Payload,
    ) -> Self::Future {
        match req.extensions().get::<UserId>() {
            Some(user_id) => ready(Ok(*user_id)),
            None => ready(Err(Rejection::Unauthenticated.into_error())),
        }
    }
}
