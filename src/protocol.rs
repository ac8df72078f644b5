//! Request/response shapes and route dispatch for the Credential Authority.
//!
//! Bodies are JSON. Field names match what clients already send (`password`, `publicKey`,
//! `message`). Responses are `{"status":"ok"}` or `{"status":"error","reason":"..."}`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::authority::CredentialAuthority;
use crate::errors::{Error, Result};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Register,
    Store,
    Verify,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Register => "/register",
            Route::Store => "/store",
            Route::Verify => "/verify",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for Route {
    type Err = Error;

    fn from_str(route: &str) -> Result<Self> {
        match route.strip_prefix('/').unwrap_or(route) {
            "register" => Ok(Route::Register),
            "store" => Ok(Route::Store),
            "verify" => Ok(Route::Verify),
            _ => Err(Error::malformed("unknown route")),
        }
    }
}

/// Passwords are wiped when the request is dropped and never printed.
#[derive(Serialize, Deserialize)]
pub struct RegisterRequest {
    pub password: Zeroizing<String>,
}

#[derive(Serialize, Deserialize)]
pub struct StoreRequest {
    pub password: Zeroizing<String>,
    #[serde(rename = "publicKey")]
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Response {
    Ok,
    Error { reason: String },
}

impl Response {
    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok)
    }

    /// HTTP status a transport should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Response::Ok => 200,
            Response::Error { reason } => match reason.as_str() {
                "unauthenticated" | "unverified" => 401,
                "unknown-route" => 404,
                _ => 400,
            },
        }
    }

    pub fn to_json(&self) -> String {
        // A unit variant and a string field cannot fail to serialize
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"status":"error"}"#.to_string())
    }
}

impl From<Result<()>> for Response {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Response::Ok,
            Err(e) => Response::Error {
                reason: e.reason().to_string(),
            },
        }
    }
}

fn parse_body<'a, T: Deserialize<'a>>(body: &'a [u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|_| Error::malformed("request body"))
}

/// dispatch runs one already-routed request against the authority.
pub fn dispatch(authority: &CredentialAuthority, route: Route, body: &[u8]) -> Result<()> {
    match route {
        Route::Register => {
            let request: RegisterRequest = parse_body(body)?;
            authority.register(&request.password)
        }
        Route::Store => {
            let request: StoreRequest = parse_body(body)?;
            authority.store(&request.password, &request.public_key)
        }
        Route::Verify => {
            let request: VerifyRequest = parse_body(body)?;
            authority.verify(&request.message)
        }
    }
}

/// handle is the transport-facing entry point: route string and raw body in, response out.
pub fn handle(authority: &CredentialAuthority, route: &str, body: &[u8]) -> Response {
    let Ok(route) = route.parse::<Route>() else {
        tracing::debug!(route, "request for unknown route");
        return Response::Error {
            reason: "unknown-route".to_string(),
        };
    };
    let response = Response::from(dispatch(authority, route, body));
    tracing::debug!(%route, status = response.status_code(), "handled request");
    response
}

/* ------------------------------------------------------------------------- */

// TESTS
