//! Authentication sub-API

use super::{datetime, result_of};
use crate::connection::{Connection, Handle};
use crate::soap::{SoapRequest, XmlElement};
use crate::{Error, Result};
use chrono::{Local, NaiveDateTime};
use std::fmt;
use tracing::{debug, info};

/// Result code of an authentication call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoginResult {
    Success,
    LoginExpired,
    LoginInvalid,
    LoginDisabled,
    MaxAttemptExceeded,
    ClientDisabled,
    LoginInUse,
    SystemDisabled,
    NewPasswordRequired,
    NewPasswordInvalid,
    Unknown,
}

impl LoginResult {
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::Success => "DMLR_SUCCESS",
            Self::LoginExpired => "DMLR_LOGINEXPIRED",
            Self::LoginInvalid => "DMLR_LOGININVALID",
            Self::LoginDisabled => "DMLR_LOGINDISABLED",
            Self::MaxAttemptExceeded => "DMLR_MAXATTEMPTEXCEEDED",
            Self::ClientDisabled => "DMLR_CLIENTDISABLED",
            Self::LoginInUse => "DMLR_LOGININUSE",
            Self::SystemDisabled => "DMLR_SYSTEMDISABLED",
            Self::NewPasswordRequired => "DMLR_NEWPWREQUIRED",
            Self::NewPasswordInvalid => "DMLR_NEWPWINVALID",
            Self::Unknown => "DMLR_UNKNOWN",
        }
    }

    /// Unrecognised codes map to [`LoginResult::Unknown`]
    pub fn from_wire(value: &str) -> Self {
        match value.trim() {
            "DMLR_SUCCESS" => Self::Success,
            "DMLR_LOGINEXPIRED" => Self::LoginExpired,
            "DMLR_LOGININVALID" => Self::LoginInvalid,
            "DMLR_LOGINDISABLED" => Self::LoginDisabled,
            "DMLR_MAXATTEMPTEXCEEDED" => Self::MaxAttemptExceeded,
            "DMLR_CLIENTDISABLED" => Self::ClientDisabled,
            "DMLR_LOGININUSE" => Self::LoginInUse,
            "DMLR_SYSTEMDISABLED" => Self::SystemDisabled,
            "DMLR_NEWPWREQUIRED" => Self::NewPasswordRequired,
            "DMLR_NEWPWINVALID" => Self::NewPasswordInvalid,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for LoginResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// User-facing outcome of a login
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success { token: String },
    InvalidCredentials,
    Failed(LoginResult),
}

impl LoginOutcome {
    /// Map a result code and token to an outcome
    ///
    /// Only a successful code with a non-empty token is a success.
    pub fn from_result(result: LoginResult, token: Option<String>) -> Self {
        match (result, token) {
            (LoginResult::Success, Some(token)) if !token.is_empty() => Self::Success { token },
            (LoginResult::Success, _) => Self::Failed(LoginResult::Unknown),
            (LoginResult::LoginInvalid, _) => Self::InvalidCredentials,
            (other, _) => Self::Failed(other),
        }
    }

    pub const fn message(&self) -> &'static str {
        match self {
            Self::Success { .. } => "Login successful.",
            Self::InvalidCredentials => "Invalid id or password",
            Self::Failed(_) => "Login was not successful.",
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Success { token } => Some(token),
            _ => None,
        }
    }
}

impl fmt::Display for LoginOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone)]
pub struct AuthenticateClient {
    handle: Handle,
}

impl AuthenticateClient {
    /// Authentication needs no token, so any connection will do
    pub fn new(connection: &Connection) -> Result<Self> {
        Ok(Self {
            handle: connection.authenticate()?,
        })
    }

    /// Raw authentication call
    ///
    /// Returns the result code and the token, if the service sent one.
    pub async fn authenticate(
        &self,
        id: &str,
        password: &str,
        new_password: &str,
        flag: bool,
        current_time: NaiveDateTime,
    ) -> Result<(LoginResult, Option<String>)> {
        let request = SoapRequest::new("Authenticate")
            .arg("id", id)
            .arg("password", password)
            .param(XmlElement::text("newPassword", new_password))
            .arg("flag", flag)
            .param(datetime("currentTime", current_time));

        let response = self.handle.call(request).await?;
        let result = result_of(&response, "Authenticate")
            .ok_or_else(|| Error::missing_element("AuthenticateResponse/AuthenticateResult"))?;
        let code = LoginResult::from_wire(&result.text);

        let token = response
            .child_ignore_case("token")
            .filter(|t| !t.is_nil())
            .map(|t| t.text.trim().to_string())
            .filter(|t| !t.is_empty());

        debug!("Authenticate returned {}", code);
        Ok((code, token))
    }

    /// Log in with an id and password
    pub async fn login(&self, id: &str, password: &str) -> Result<LoginOutcome> {
        let (code, token) = self
            .authenticate(id, password, "", true, Local::now().naive_local())
            .await?;
        let outcome = LoginOutcome::from_result(code, token);
        info!("Login for {}: {}", id, outcome.message());
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_codes() {
        assert_eq!(LoginResult::from_wire("DMLR_SUCCESS"), LoginResult::Success);
        assert_eq!(
            LoginResult::from_wire(" DMLR_NEWPWINVALID "),
            LoginResult::NewPasswordInvalid
        );
        assert_eq!(LoginResult::from_wire("SOMETHING_NEW"), LoginResult::Unknown);
        assert_eq!(LoginResult::MaxAttemptExceeded.as_wire(), "DMLR_MAXATTEMPTEXCEEDED");
    }

    #[test]
    fn test_outcome_messages() {
        let success = LoginOutcome::from_result(LoginResult::Success, Some("tok".to_string()));
        assert!(success.is_success());
        assert_eq!(success.token(), Some("tok"));
        assert_eq!(success.message(), "Login successful.");

        let invalid = LoginOutcome::from_result(LoginResult::LoginInvalid, None);
        assert_eq!(invalid.message(), "Invalid id or password");

        for code in [
            LoginResult::LoginExpired,
            LoginResult::LoginDisabled,
            LoginResult::MaxAttemptExceeded,
            LoginResult::ClientDisabled,
            LoginResult::LoginInUse,
            LoginResult::SystemDisabled,
            LoginResult::NewPasswordRequired,
            LoginResult::NewPasswordInvalid,
            LoginResult::Unknown,
        ] {
            let outcome = LoginOutcome::from_result(code, None);
            assert_eq!(outcome, LoginOutcome::Failed(code));
            assert_ne!(outcome.message(), invalid.message());
            assert!(outcome.token().is_none());
        }
    }

    #[test]
    fn test_success_without_token_is_failure() {
        let outcome = LoginOutcome::from_result(LoginResult::Success, Some(String::new()));
        assert_eq!(outcome, LoginOutcome::Failed(LoginResult::Unknown));
    }
}
