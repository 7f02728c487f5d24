use crate::entities::user;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use sea_orm::*;

/// A user account as seen by the rest of the application. The password hash never leaves
/// this module.
#[derive(Debug, PartialEq, Clone, Eq, Hash)]
pub struct User {
    id: u32,
    login: String,
    full_name: String,
}

impl User {
    pub fn new(id: u32, login: String, full_name: String) -> Self {
        Self {
            id,
            login,
            full_name,
        }
    }

    /// Returns the ID of the user.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the unique login of the user.
    pub fn login(&self) -> &str {
        &self.login
    }

    /// Returns the display name of the user.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }
}

impl From<user::Model> for User {
    fn from(model: user::Model) -> Self {
        User::new(model.id as u32, model.login, model.full_name)
    }
}

/// Error type for UserService operations.
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("User with login '{0}' already exists")]
    DuplicateLogin(String),
    #[error("User with ID {0} not found")]
    UserNotFound(u32),
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Hashes a plain-text password into an Argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String, UserServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserServiceError::Hashing(e.to_string()))
}

/// Checks a plain-text password against a stored PHC string. A malformed hash never verifies.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(password_hash) else {
        tracing::warn!("Stored password hash could not be parsed");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

pub struct UserService<'a> {
    db: &'a sea_orm::DatabaseConnection,
}

impl UserService<'_> {
    pub fn new(db: &sea_orm::DatabaseConnection) -> UserService<'_> {
        UserService { db }
    }

    /// Creates a new user with a freshly hashed password.
    ///
    /// # Arguments
    ///
    /// * `login` - The unique login of the user.
    /// * `full_name` - The display name of the user.
    /// * `password` - The plain-text password; only its hash is stored.
    ///
    /// # Returns
    ///
    /// A `Result` containing the created `User`, or `DuplicateLogin` if the login is taken.
    #[tracing::instrument(skip(self, password))]
    pub async fn create_user(
        &self,
        login: &str,
        full_name: &str,
        password: &str,
    ) -> Result<User, UserServiceError> {
        if self.find_model_by_login(login).await?.is_some() {
            return Err(UserServiceError::DuplicateLogin(login.to_string()));
        }

        let active_model = user::ActiveModel {
            login: ActiveValue::Set(login.to_string()),
            full_name: ActiveValue::Set(full_name.to_string()),
            password_hash: ActiveValue::Set(hash_password(password)?),
            ..Default::default()
        };
        let created_model = active_model.insert(self.db).await?;
        Ok(User::from(created_model))
    }

    /// Returns the user with the given login, creating it when it does not exist yet.
    /// An existing account keeps its password.
    #[tracing::instrument(skip(self, password))]
    pub async fn ensure_user(
        &self,
        login: &str,
        full_name: &str,
        password: &str,
    ) -> Result<User, UserServiceError> {
        match self.find_model_by_login(login).await? {
            Some(model) => Ok(User::from(model)),
            None => {
                tracing::info!("Creating user '{}'", login);
                self.create_user(login, full_name, password).await
            }
        }
    }

    /// Looks up a user by login and checks the password.
    ///
    /// # Returns
    ///
    /// `Ok(Some(user))` when the login exists and the password matches, `Ok(None)` otherwise.
    #[tracing::instrument(skip(self, password))]
    pub async fn verify_credentials(
        &self,
        login: &str,
        password: &str,
    ) -> Result<Option<User>, UserServiceError> {
        let Some(model) = self.find_model_by_login(login).await? else {
            return Ok(None);
        };
        if verify_password(password, &model.password_hash) {
            Ok(Some(User::from(model)))
        } else {
            Ok(None)
        }
    }

    /// Retrieves a user by ID.
    #[tracing::instrument(skip(self))]
    pub async fn get_user_by_id(&self, id: u32) -> Result<User, UserServiceError> {
        let model = user::Entity::find_by_id(id as i32)
            .one(self.db)
            .await?
            .ok_or(UserServiceError::UserNotFound(id))?;
        Ok(User::from(model))
    }

    /// Retrieves all users ordered by display name.
    #[tracing::instrument(skip(self))]
    pub async fn get_all_users(&self) -> Result<Vec<User>, UserServiceError> {
        let users = user::Entity::find()
            .order_by_asc(user::Column::FullName)
            .all(self.db)
            .await?
            .into_iter()
            .map(User::from)
            .collect();
        Ok(users)
    }

    async fn find_model_by_login(&self, login: &str) -> Result<Option<user::Model>, DbErr> {
        user::Entity::find()
            .filter(user::Column::Login.eq(login))
            .one(self.db)
            .await
    }
}
