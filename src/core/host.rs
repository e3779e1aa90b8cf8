//! Which kind of server the tools are running on.
//!
//! The same tools serve several application fleets; the server's hostname
//! decides which extra steps apply.

use serde::Serialize;

use crate::error::Error;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HostProfile {
    /// PHP + node application managed by pm2, library `env.json`, parsed
    /// database settings.
    Intranet,
    /// Laravel application configured through `.env`.
    Laravel,
    Plain,
}

impl HostProfile {
    pub fn from_hostname(hostname: &str) -> Self {
        if hostname.contains("intranet") {
            HostProfile::Intranet
        } else if hostname.contains("ees") {
            HostProfile::Laravel
        } else {
            HostProfile::Plain
        }
    }

    pub fn detect() -> Result<Self> {
        let name = hostname()?;
        let profile = Self::from_hostname(&name);
        log::debug!("Host {} uses the {:?} profile", name, profile);
        Ok(profile)
    }

    pub fn uses_pm2(self) -> bool {
        self == HostProfile::Intranet
    }
}

pub fn hostname() -> Result<String> {
    let name = gethostname::gethostname();
    let name = name.to_string_lossy().into_owned();
    if name.is_empty() {
        return Err(Error::internal_io(
            "hostname is empty",
            Some("gethostname".to_string()),
        ));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_from_hostname() {
        assert_eq!(
            HostProfile::from_hostname("dev-intranet-01"),
            HostProfile::Intranet
        );
        assert_eq!(HostProfile::from_hostname("ees-preview"), HostProfile::Laravel);
        assert_eq!(HostProfile::from_hostname("build-box"), HostProfile::Plain);
    }

    #[test]
    fn only_intranet_uses_pm2() {
        assert!(HostProfile::Intranet.uses_pm2());
        assert!(!HostProfile::Laravel.uses_pm2());
    }

    #[test]
    fn hostname_is_not_empty() {
        assert!(!hostname().unwrap().is_empty());
    }
}
