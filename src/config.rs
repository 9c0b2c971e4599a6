use std::env;

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    pub calendar_domain: String,
    pub calendar_prodid: String,
    pub bootstrap_super_admin: Option<BootstrapAdmin>,
}

/// First super-admin account, created at startup when missing.
#[derive(Clone, Debug)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string());
        let session_ttl_hours = lookup("SESSION_TTL_HOURS")
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|h| *h > 0)
            .unwrap_or(24);
        let calendar_domain =
            lookup("CALENDAR_DOMAIN").unwrap_or_else(|| "kamalamassage.com".to_string());
        let calendar_prodid =
            lookup("CALENDAR_PRODID").unwrap_or_else(|| "-//Kamala Massage//EN".to_string());

        let bootstrap_super_admin = match (
            lookup("BOOTSTRAP_SUPER_ADMIN_EMAIL"),
            lookup("BOOTSTRAP_SUPER_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
                Some(BootstrapAdmin { email, password })
            }
            _ => None,
        };

        Ok(Self {
            database_url,
            bind_addr,
            session_ttl_hours,
            calendar_domain,
            calendar_prodid,
            bootstrap_super_admin,
        })
    }
}
