use askama::Template;
use axum::Router;
use axum::extract::{Extension, Form, MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use std::sync::Arc;
use tower_http::trace::MakeSpan;
use tracing::Span;

use crate::config::Config;
use crate::user::{User, UserService, UserServiceError};

pub mod api;

/// Name of the cookie carrying the session token.
pub const AUTH_COOKIE: &str = "auth_token";
/// Name of the one-shot cookie carrying a notice for the login page.
pub const FLASH_COOKIE: &str = "flash";

/// Where unauthenticated visitors are sent.
pub const LOGIN_PATH: &str = "/auth";
/// Where a successful login lands.
pub const HOME_PATH: &str = "/open_tasks";

const SESSION_HOURS: i64 = 24;
const REMEMBER_ME_DAYS: i64 = 30;

/// Represents the currently authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: u32,
    pub login: String,
    pub full_name: String,
}

impl CurrentUser {
    /// Creates a new CurrentUser instance.
    pub fn new(id: u32, login: String, full_name: String) -> Self {
        Self {
            id,
            login,
            full_name,
        }
    }
}

impl From<User> for CurrentUser {
    fn from(user: User) -> Self {
        CurrentUser::new(user.id(), user.login().to_string(), user.full_name().to_string())
    }
}

/// Authentication state containing the store handle and the JWT secret.
#[derive(Clone)]
pub struct AuthState {
    pub db: Arc<sea_orm::DatabaseConnection>,
    pub jwt_secret: String,
}

impl AuthState {
    /// Creates a new AuthState from the application config.
    pub fn from_config(config: &Config, db: Arc<sea_orm::DatabaseConnection>) -> Self {
        Self {
            db,
            jwt_secret: config.jwt_secret.clone(),
        }
    }

    /// Resolves a session token to the user it was issued for.
    /// The user is reloaded from the store so removed accounts lose access.
    /// Invalid tokens and unknown users resolve to `None`; store failures are errors.
    pub async fn resolve_user(&self, token: &str) -> Result<Option<CurrentUser>, UserServiceError> {
        let Ok(claims) = decode_jwt(token, &self.jwt_secret) else {
            return Ok(None);
        };
        match UserService::new(&self.db).get_user_by_id(claims.sub).await {
            Ok(user) => Ok(Some(CurrentUser::from(user))),
            Err(UserServiceError::UserNotFound(id)) => {
                tracing::warn!("Session refers to missing user {}", id);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct Claims {
    pub exp: usize,    // Expiry time of the token
    pub iat: usize,    // Issued at time of the token
    pub sub: u32,      // ID of the authenticated user
    pub login: String, // Login of the authenticated user
}

/// A freshly established login.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub token: String,
    pub remember: bool,
}

impl Session {
    /// Builds the cookie carrying this session. A remembered session survives browser restarts.
    pub fn cookie(&self) -> Cookie<'static> {
        let mut builder = Cookie::build((AUTH_COOKIE, self.token.clone()))
            .http_only(true)
            .secure(false) // Set to true in production with HTTPS
            .same_site(SameSite::Lax)
            .path("/");
        if self.remember {
            builder = builder.max_age(time::Duration::days(REMEMBER_ME_DAYS));
        }
        builder.build()
    }
}

/// Custom error type for authentication operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The login is unknown or the password does not match.
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// Represents an error during template rendering.
    /// The specific `askama::Error` is captured as the source of this error.
    #[error("Template rendering failed")]
    Template(#[from] askama::Error),
    /// Represents an error during JWT operations.
    #[error("JWT operation failed")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    /// Represents a failure of the user store.
    #[error("User lookup failed")]
    User(#[from] UserServiceError),
}

impl axum::response::IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        if let AuthError::InvalidCredentials = self {
            return Redirect::to(LOGIN_PATH).into_response();
        }
        tracing::error!("Authentication failed: {:?}", self);
        crate::web::error_page(
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "An unexpected error occurred while processing your request. Please try again later.",
        )
    }
}

/// Verifies credentials and issues session tokens.
pub struct AuthService<'a> {
    db: &'a sea_orm::DatabaseConnection,
    jwt_secret: &'a str,
}

impl<'a> AuthService<'a> {
    pub fn new(db: &'a sea_orm::DatabaseConnection, jwt_secret: &'a str) -> Self {
        Self { db, jwt_secret }
    }

    /// Checks the login and password and, on success, issues a session for the user.
    ///
    /// # Arguments
    ///
    /// * `login` - The unique login of the user.
    /// * `password` - The plain-text password to verify.
    /// * `remember` - Whether the session should outlive the browser session.
    ///
    /// # Returns
    ///
    /// A `Session` on success, `InvalidCredentials` for an unknown login or a wrong password.
    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        login: &str,
        password: &str,
        remember: bool,
    ) -> Result<Session, AuthError> {
        let user = UserService::new(self.db)
            .verify_credentials(login, password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let lifetime = if remember {
            chrono::Duration::days(REMEMBER_ME_DAYS)
        } else {
            chrono::Duration::hours(SESSION_HOURS)
        };
        let token = encode_jwt(&user, self.jwt_secret, lifetime)?;
        Ok(Session {
            user,
            token,
            remember,
        })
    }
}

pub fn encode_jwt(
    user: &User,
    jwt_secret: &str,
    lifetime: chrono::Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now();
    let exp = (now + lifetime).timestamp() as usize;
    let iat = now.timestamp() as usize;
    let claims = Claims {
        exp,
        iat,
        sub: user.id(),
        login: user.login().to_string(),
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
}

pub fn decode_jwt(token: &str, jwt_secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = jsonwebtoken::decode(
        token,
        &jsonwebtoken::DecodingKey::from_secret(jwt_secret.as_bytes()),
        &jsonwebtoken::Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Notices carried across the redirect back to the login page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flash {
    InvalidCredentials,
}

impl Flash {
    fn cookie_value(self) -> &'static str {
        match self {
            Flash::InvalidCredentials => "invalid_credentials",
        }
    }

    fn from_cookie_value(value: &str) -> Option<Self> {
        match value {
            "invalid_credentials" => Some(Flash::InvalidCredentials),
            _ => None,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Flash::InvalidCredentials => {
                "Пожалуйста, проверьте свои данные для входа и попробуйте еще раз."
            }
        }
    }

    fn cookie(self) -> Cookie<'static> {
        Cookie::build((FLASH_COOKIE, self.cookie_value()))
            .http_only(true)
            .same_site(SameSite::Lax)
            .path("/")
            .build()
    }
}

/// Creates a login router with authentication routes.
pub fn create_login_router(state: Arc<AuthState>) -> Router<()> {
    Router::new()
        .route(
            "/",
            axum::routing::get(login_page_handler).post(login_handler),
        )
        .route(
            LOGIN_PATH,
            axum::routing::get(login_page_handler).post(login_handler),
        )
        .with_state(state)
}

/// Authentication middleware that checks for a valid session cookie and sets CurrentUser extension.
/// This middleware only populates the CurrentUser extension and does not perform redirects.
pub async fn auth_user_middleware(
    State(state): State<Arc<AuthState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token_cookie) = jar.get(AUTH_COOKIE) {
        match state.resolve_user(token_cookie.value()).await {
            Ok(Some(current_user)) => {
                request.extensions_mut().insert(current_user);
            }
            Ok(None) => {}
            Err(err) => return crate::web::WebError::from(err).into_response(),
        }
    }

    next.run(request).await
}

/// Login redirect middleware that redirects unauthenticated users to the login page.
/// This middleware should be applied after auth_user_middleware to check for CurrentUser extension.
pub async fn login_redirect_middleware(request: Request, next: Next) -> Response {
    let is_authenticated = request.extensions().get::<CurrentUser>().is_some();

    if !is_authenticated {
        return Redirect::to(LOGIN_PATH).into_response();
    }

    next.run(request).await
}

/// Represents the login form payload.
#[derive(serde::Deserialize, Debug)]
pub struct LoginForm {
    pub login: String,
    pub password: String,
    pub remember_me: Option<String>,
}

/// Handles the login form submission.
/// On success stores the session cookie and redirects to the task list; on failure
/// redirects back to the login page with a flash notice.
#[tracing::instrument(skip(state, jar, form))]
pub async fn login_handler(
    State(state): State<Arc<AuthState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<(CookieJar, Redirect), AuthError> {
    let auth_service = AuthService::new(&state.db, &state.jwt_secret);
    let remember = form.remember_me.is_some();

    match auth_service
        .authenticate(&form.login, &form.password, remember)
        .await
    {
        Ok(session) => {
            tracing::info!("User {} logged in", session.user.id());
            Ok((jar.add(session.cookie()), Redirect::to(HOME_PATH)))
        }
        Err(AuthError::InvalidCredentials) => {
            tracing::warn!(login = %form.login, "Rejected login attempt");
            Ok((
                jar.add(Flash::InvalidCredentials.cookie()),
                Redirect::to(LOGIN_PATH),
            ))
        }
        Err(err) => Err(err),
    }
}

/// Ends the session by removing the session cookie.
#[tracing::instrument(skip(jar))]
pub async fn logout_handler(jar: CookieJar) -> (CookieJar, Redirect) {
    let jar = jar.remove(Cookie::build((AUTH_COOKIE, "")).path("/"));
    (jar, Redirect::to(LOGIN_PATH))
}

#[derive(Template)]
#[template(path = "auth.html")]
pub struct LoginTemplate {
    pub current_user: Option<CurrentUser>,
    pub flash: Option<&'static str>,
}

/// Handles GET requests to display the login page. Consumes any pending flash notice.
#[tracing::instrument(skip(jar))]
pub async fn login_page_handler(
    current_user: Option<Extension<CurrentUser>>,
    jar: CookieJar,
) -> Result<(CookieJar, Html<String>), AuthError> {
    let flash = jar
        .get(FLASH_COOKIE)
        .and_then(|cookie| Flash::from_cookie_value(cookie.value()))
        .map(Flash::message);
    let jar = if jar.get(FLASH_COOKIE).is_some() {
        jar.remove(Cookie::build((FLASH_COOKIE, "")).path("/"))
    } else {
        jar
    };

    let template = LoginTemplate {
        current_user: current_user.map(|Extension(user)| user),
        flash,
    };
    let html = template.render()?;
    Ok((jar, Html(html)))
}

/// Custom span maker that filters sensitive data from login requests.
/// This implementation avoids logging request bodies and cookies for security.
#[derive(Clone, Debug)]
pub struct FilteredMakeSpan;

impl FilteredMakeSpan {
    fn is_sensitive(path: &str) -> bool {
        matches!(path, "/" | LOGIN_PATH | "/api/v1/login")
    }
}

impl<B> MakeSpan<B> for FilteredMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> Span {
        let uri = request.uri();
        let method = request.method();
        let matched_path = request
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str);

        if Self::is_sensitive(uri.path()) {
            tracing::info_span!(
                "request",
                method = %method,
                path = %uri.path(),
                matched_path,
                sensitive_route = true,
            )
        } else {
            tracing::info_span!(
                "request",
                method = %method,
                uri = %uri,
                matched_path,
            )
        }
    }
}
