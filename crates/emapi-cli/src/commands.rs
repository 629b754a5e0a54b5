//! Command line parsing for the interactive reader

use std::path::PathBuf;

/// Commands recognised by the reader but not implemented by this tool
pub const UNSUPPORTED: &[&str] = &[
    "listcreate",
    "listupload",
    "listdownload",
    "listquery",
    "send_anemail",
    "send_multipleemails_withoutdeployment",
    "createcreative",
    "unsubscribe",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { id: String, password: String },
    /// Export the event log to the configured output file
    ExportResponse,
    /// Bulk import recipients into the configured list and deployment
    SendMultipleWithDeployment { csv_file: Option<PathBuf> },
    Exit,
    Unsupported(String),
    Unknown(String),
    /// Blank line
    Empty,
}

impl Command {
    /// Parse one input line
    ///
    /// The first whitespace separated token selects the command, ignoring
    /// case. Extra arguments are ignored.
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut tokens = line.split_whitespace();
        let Some(name) = tokens.next() else {
            return Ok(Self::Empty);
        };

        let command = match name.to_ascii_lowercase().as_str() {
            "login" => match (tokens.next(), tokens.next()) {
                (Some(id), Some(password)) => Self::Login {
                    id: id.to_string(),
                    password: password.to_string(),
                },
                _ => return Err("Usage: login <id> <password>".to_string()),
            },
            "exportresponse" => Self::ExportResponse,
            "send_multipleemails_withdeployment" => Self::SendMultipleWithDeployment {
                csv_file: tokens.next().map(PathBuf::from),
            },
            "exit" => Self::Exit,
            lower if UNSUPPORTED.contains(&lower) => Self::Unsupported(name.to_string()),
            _ => Self::Unknown(name.to_string()),
        };
        Ok(command)
    }

    /// Whether the command needs an access token
    pub const fn requires_login(&self) -> bool {
        matches!(
            self,
            Self::ExportResponse | Self::SendMultipleWithDeployment { .. }
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_login() {
        assert_eq!(
            Command::parse("login user s3cret").unwrap(),
            Command::Login {
                id: "user".to_string(),
                password: "s3cret".to_string()
            }
        );
        assert!(Command::parse("login user").is_err());
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("  exit ").unwrap(), Command::Exit);
        assert_eq!(Command::parse("").unwrap(), Command::Empty);
        assert_eq!(
            Command::parse("ExportResponse").unwrap(),
            Command::ExportResponse
        );
        assert_eq!(
            Command::parse("send_multipleemails_withdeployment people.csv").unwrap(),
            Command::SendMultipleWithDeployment {
                csv_file: Some(PathBuf::from("people.csv"))
            }
        );
        assert_eq!(
            Command::parse("Unsubscribe").unwrap(),
            Command::Unsupported("Unsubscribe".to_string())
        );
        assert_eq!(
            Command::parse("dance").unwrap(),
            Command::Unknown("dance".to_string())
        );
    }

    #[test]
    fn test_requires_login() {
        assert!(Command::ExportResponse.requires_login());
        assert!(!Command::Exit.requires_login());
        assert!(!Command::Unsupported("listquery".to_string()).requires_login());
    }
}
