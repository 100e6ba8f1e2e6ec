use actix_web::http::StatusCode;
use actix_web::http::header::{CONTENT_TYPE, LOCATION};
use actix_web::{HttpResponse, Responder, web};
use tracing::{debug, trace};

use crate::errors::UrlshrtError;
use crate::model::{BatchShortenRequestItem, ShortenRequest, ShortenResponse, UserId};
use crate::services::LinkService;

/// Link endpoints
pub struct LinkHandlers;

impl LinkHandlers {
    /// `POST /` with the URL as plain text body, stored exactly as sent
    pub async fn shorten_text(
        links: web::Data<LinkService>,
        user: web::ReqData<UserId>,
        body: String,
    ) -> Result<HttpResponse, UrlshrtError> {
        let (status, short_url) = Self::shorten(&links, *user, &body).await?;
        Ok(HttpResponse::build(status)
            .insert_header((CONTENT_TYPE, "text/plain; charset=utf-8"))
            .body(short_url))
    }

    /// `POST /api/shorten` with `{"url": ...}`
    pub async fn shorten_json(
        links: web::Data<LinkService>,
        user: web::ReqData<UserId>,
        req: web::Json<ShortenRequest>,
    ) -> Result<HttpResponse, UrlshrtError> {
        let (status, result) = Self::shorten(&links, *user, &req.url).await?;
        Ok(HttpResponse::build(status).json(ShortenResponse { result }))
    }

    /// 201 for a new link, 409 with the existing short URL on duplicate
    async fn shorten(
        links: &LinkService,
        user: UserId,
        url: &str,
    ) -> Result<(StatusCode, String), UrlshrtError> {
        match links.shorten(user, url).await {
            Ok(short_url) => Ok((StatusCode::CREATED, short_url)),
            Err(e) => match links.existing_short_url(&e) {
                Some(short_url) => {
                    debug!("Duplicate URL shortened by user {}: {}", user, url);
                    Ok((StatusCode::CONFLICT, short_url))
                }
                None => Err(e),
            },
        }
    }

    /// `POST /api/shorten/batch`
    pub async fn shorten_batch(
        links: web::Data<LinkService>,
        user: web::ReqData<UserId>,
        req: web::Json<Vec<BatchShortenRequestItem>>,
    ) -> Result<HttpResponse, UrlshrtError> {
        let result = links.batch_shorten(*user, req.into_inner()).await?;
        let status = if result.duplicate {
            StatusCode::CONFLICT
        } else {
            StatusCode::CREATED
        };
        Ok(HttpResponse::build(status).json(result.items))
    }

    /// `GET /{id}`
    pub async fn redirect(
        links: web::Data<LinkService>,
        user: web::ReqData<UserId>,
        path: web::Path<String>,
    ) -> Result<HttpResponse, UrlshrtError> {
        let id = path.into_inner();
        let url = links.lengthen(*user, &id).await?;
        trace!("Redirecting {} -> {}", id, url);
        Ok(HttpResponse::TemporaryRedirect()
            .insert_header((LOCATION, url))
            .finish())
    }

    /// `GET /api/user/urls`
    pub async fn user_urls(
        links: web::Data<LinkService>,
        user: web::ReqData<UserId>,
    ) -> Result<HttpResponse, UrlshrtError> {
        let urls = links.user_urls(*user).await?;
        if urls.is_empty() {
            return Ok(HttpResponse::NoContent().finish());
        }
        Ok(HttpResponse::Ok().json(urls))
    }

    /// `DELETE /api/user/urls` with a JSON array of ids
    pub async fn delete_urls(
        links: web::Data<LinkService>,
        user: web::ReqData<UserId>,
        req: web::Json<Vec<String>>,
    ) -> Result<impl Responder, UrlshrtError> {
        links.batch_delete(*user, &req).await?;
        Ok(HttpResponse::Accepted().finish())
    }
}

/// Link 路由配置
pub fn link_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::post().to(LinkHandlers::shorten_text))
        .route("/api/shorten", web::post().to(LinkHandlers::shorten_json))
        .route(
            "/api/shorten/batch",
            web::post().to(LinkHandlers::shorten_batch),
        )
        .route("/api/user/urls", web::get().to(LinkHandlers::user_urls))
        .route("/api/user/urls", web::delete().to(LinkHandlers::delete_urls))
        .route("/{id}", web::get().to(LinkHandlers::redirect));
}
