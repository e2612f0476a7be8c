//! Authentication gating: route whitelist and CSRF token presence.

use crate::config::schema::SecuritySettings;
use crate::gateway::request::GatewayRequest;

/// Header that must accompany mutating methods.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Check the request against the auth policy.
///
/// Whitelisted endpoint prefixes and `skip_auth` requests pass through;
/// otherwise mutating methods must carry a non-empty CSRF token header.
pub fn authenticate(request: &GatewayRequest, security: &SecuritySettings) -> Result<(), String> {
    if request.skip_auth {
        return Ok(());
    }
    if security
        .auth_whitelist
        .iter()
        .any(|prefix| request.endpoint.starts_with(prefix.as_str()))
    {
        return Ok(());
    }

    if security.require_csrf && request.method.is_mutating() {
        match request.header(CSRF_HEADER) {
            Some(token) if !token.is_empty() => Ok(()),
            _ => Err(format!(
                "missing {CSRF_HEADER} header on {} request",
                request.method.as_str()
            )),
        }
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::request::HttpMethod;

    #[test]
    fn get_requests_pass_without_token() {
        let request = GatewayRequest::new(HttpMethod::Get, "/api/calls");
        assert!(authenticate(&request, &SecuritySettings::default()).is_ok());
    }

    #[test]
    fn mutating_requests_require_csrf_token() {
        let security = SecuritySettings::default();
        let request = GatewayRequest::new(HttpMethod::Post, "/api/calls");
        assert!(authenticate(&request, &security).is_err());

        let request = request.with_header(CSRF_HEADER, "tok-1");
        assert!(authenticate(&request, &security).is_ok());
    }

    #[test]
    fn empty_token_is_rejected() {
        let request =
            GatewayRequest::new(HttpMethod::Delete, "/api/calls").with_header(CSRF_HEADER, "");
        assert!(authenticate(&request, &SecuritySettings::default()).is_err());
    }

    #[test]
    fn whitelisted_routes_skip_auth() {
        let request = GatewayRequest::new(HttpMethod::Post, "/health/detail");
        assert!(authenticate(&request, &SecuritySettings::default()).is_ok());
    }

    #[test]
    fn skip_auth_flag_bypasses_check() {
        let mut request = GatewayRequest::new(HttpMethod::Post, "/api/calls");
        request.skip_auth = true;
        assert!(authenticate(&request, &SecuritySettings::default()).is_ok());
    }
}
