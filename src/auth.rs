use async_trait::async_trait;
use pgwire::api::auth::{AuthSource, LoginInfo, Password};
use pgwire::error::PgWireResult;

/// Login name that maps to the back-office principal.
pub const ADMIN_USER: &str = "admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    Admin,
    Anonymous,
}

impl Principal {
    pub fn for_user(user: Option<&str>) -> Self {
        match user {
            Some(ADMIN_USER) => Principal::Admin,
            _ => Principal::Anonymous,
        }
    }
}

/// Two shared passwords: one for `admin`, one for every other login.
#[derive(Debug)]
pub struct StudioAuthSource {
    admin_password: String,
    public_password: String,
}

impl StudioAuthSource {
    pub fn new(admin_password: String, public_password: String) -> Self {
        Self {
            admin_password,
            public_password,
        }
    }

    fn password_for(&self, principal: Principal) -> &str {
        match principal {
            Principal::Admin => &self.admin_password,
            Principal::Anonymous => &self.public_password,
        }
    }
}

#[async_trait]
impl AuthSource for StudioAuthSource {
    async fn get_password(&self, login: &LoginInfo) -> PgWireResult<Password> {
        let principal = Principal::for_user(login.user());
        Ok(Password::new(
            None,
            self.password_for(principal).as_bytes().to_vec(),
        ))
    }
}
