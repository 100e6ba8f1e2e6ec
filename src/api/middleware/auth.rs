//! Cookie authentication middleware
//!
//! Resolves the caller's [`UserId`] from a JWT cookie and stores it in the
//! request extensions (handlers extract it with `web::ReqData<UserId>`):
//! - no cookie: create a user and set a fresh `HttpOnly` cookie on the response
//! - valid cookie: use its user id
//! - invalid cookie: 401

use actix_service::{Service, Transform};
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::EitherBody,
    cookie::Cookie,
    dev::{ServiceRequest, ServiceResponse},
    http::header::CONTENT_TYPE,
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, error, info, trace};

use crate::api::jwt::JwtService;
use crate::model::UserId;
use crate::services::LinkService;

/// Cookie authentication middleware factory
#[derive(Clone)]
pub struct CookieAuth {
    jwt: Arc<JwtService>,
    links: Arc<LinkService>,
    cookie_name: Rc<str>,
}

impl CookieAuth {
    pub fn new(jwt: Arc<JwtService>, links: Arc<LinkService>, cookie_name: &str) -> Self {
        Self {
            jwt,
            links,
            cookie_name: Rc::from(cookie_name),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for CookieAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = CookieAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CookieAuthMiddleware {
            service: Rc::new(service),
            jwt: Arc::clone(&self.jwt),
            links: Arc::clone(&self.links),
            cookie_name: Rc::clone(&self.cookie_name),
        }))
    }
}

pub struct CookieAuthMiddleware<S> {
    service: Rc<S>,
    jwt: Arc<JwtService>,
    links: Arc<LinkService>,
    cookie_name: Rc<str>,
}

impl<S, B> CookieAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    fn handle_unauthorized(req: ServiceRequest) -> ServiceResponse<EitherBody<B>> {
        req.into_response(
            HttpResponse::Unauthorized()
                .insert_header((CONTENT_TYPE, "text/plain; charset=utf-8"))
                .body("Unauthorized")
                .map_into_right_body(),
        )
    }

    fn handle_internal_error(req: ServiceRequest) -> ServiceResponse<EitherBody<B>> {
        req.into_response(
            HttpResponse::InternalServerError()
                .insert_header((CONTENT_TYPE, "text/plain; charset=utf-8"))
                .body("Internal Server Error")
                .map_into_right_body(),
        )
    }
}

impl<S, B> Service<ServiceRequest> for CookieAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();
        let jwt = Arc::clone(&self.jwt);
        let links = Arc::clone(&self.links);
        let cookie_name = Rc::clone(&self.cookie_name);

        Box::pin(async move {
            // 已有 cookie：校验后直接放行
            if let Some(cookie) = req.cookie(&cookie_name) {
                return match jwt.validate(cookie.value()) {
                    Ok(user) => {
                        trace!("Cookie auth: request from user {}", user);
                        req.extensions_mut().insert(user);
                        let res = srv.call(req).await?;
                        Ok(res.map_into_left_body())
                    }
                    Err(e) => {
                        info!("Cookie auth: invalid token: {}", e);
                        Ok(Self::handle_unauthorized(req))
                    }
                };
            }

            // 首次访问：创建用户并下发 cookie
            let user: UserId = match links.create_user().await {
                Ok(user) => user,
                Err(e) => {
                    error!("Cookie auth: unable to create user: {}", e);
                    return Ok(Self::handle_internal_error(req));
                }
            };
            let token = match jwt.issue(user) {
                Ok(token) => token,
                Err(e) => {
                    error!("Cookie auth: unable to create token: {}", e);
                    return Ok(Self::handle_internal_error(req));
                }
            };
            debug!("Cookie auth: issued token for new user {}", user);

            req.extensions_mut().insert(user);
            let mut res = srv.call(req).await?;

            let cookie = Cookie::build(cookie_name.to_string(), token)
                .path("/")
                .http_only(true)
                .finish();
            res.response_mut().add_cookie(&cookie)?;

            Ok(res.map_into_left_body())
        })
    }
}
