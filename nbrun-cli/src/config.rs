//! Configuration module
//!
//! Connection settings shared by every command.

use clap::ValueEnum;
use nbrun_client::{AuthScheme, ClusterClient};
use std::sync::Arc;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the service
    pub api_url: String,
    /// Personal access token
    pub token: String,
    /// How the token is presented
    pub auth: AuthScheme,
}

impl Config {
    /// Build a client for this configuration
    pub fn client(&self) -> Arc<ClusterClient> {
        Arc::new(ClusterClient::with_auth(
            self.api_url.as_str(),
            &self.token,
            self.auth,
        ))
    }
}

/// `--auth` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthArg {
    Basic,
    Bearer,
}

impl From<AuthArg> for AuthScheme {
    fn from(arg: AuthArg) -> Self {
        match arg {
            AuthArg::Basic => AuthScheme::Basic,
            AuthArg::Bearer => AuthScheme::Bearer,
        }
    }
}
