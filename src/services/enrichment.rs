// Session enrichment: parse the user agent into a human-readable
// device description (woothee) and resolve a coarse location from the
// client IP. Both enrichers are total - empty or garbage input yields
// None, never an error - because enrichment must not block login.

use woothee::parser::Parser;

/// Parse "Chrome 120 on Mac OSX" style device info from a user agent.
/// Empty and unrecognized strings yield None.
pub fn enrich_device(user_agent: &str) -> Option<String> {
    if user_agent.trim().is_empty() {
        return None;
    }

    let parser = Parser::new();
    match parser.parse(user_agent) {
        Some(result) => {
            if result.name == "UNKNOWN" {
                Some("Unknown device".to_string())
            } else if result.os == "UNKNOWN" {
                Some(result.name.to_string())
            } else {
                Some(format!(
                    "{} {} on {}",
                    result.name, result.version, result.os
                ))
            }
        },
        None => Some("Unknown device".to_string()),
    }
}

/// Coarse location from the client IP. Without an external geo
/// database this resolves private/loopback ranges and leaves public
/// addresses unresolved; a real resolver slots in behind the same
/// signature.
pub fn enrich_location(ip_address: &str) -> Option<String> {
    let ip = ip_address.trim();
    if ip.is_empty() {
        return None;
    }

    let parsed: std::net::IpAddr = ip.parse().ok()?;
    match parsed {
        std::net::IpAddr::V4(v4) => {
            if v4.is_loopback() || v4.is_private() || v4.is_link_local() {
                Some("Local network".to_string())
            } else {
                None
            }
        },
        std::net::IpAddr::V6(v6) => {
            if v6.is_loopback() {
                Some("Local network".to_string())
            } else {
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
        AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    #[test]
    fn test_device_from_chrome_ua() {
        let device = enrich_device(CHROME_UA).unwrap();
        assert!(device.contains("Chrome"), "got {}", device);
    }

    #[test]
    fn test_empty_user_agent_yields_none() {
        assert_eq!(enrich_device(""), None);
        assert_eq!(enrich_device("   "), None);
    }

    #[test]
    fn test_garbage_user_agent_is_unknown_device() {
        assert_eq!(
            enrich_device("definitely-not-a-browser/0.0"),
            Some("Unknown device".to_string())
        );
    }

    #[test]
    fn test_private_ip_resolves_to_local() {
        assert_eq!(
            enrich_location("192.168.1.10"),
            Some("Local network".to_string())
        );
        assert_eq!(
            enrich_location("127.0.0.1"),
            Some("Local network".to_string())
        );
        assert_eq!(enrich_location("::1"), Some("Local network".to_string()));
    }

    #[test]
    fn test_public_ip_is_unresolved() {
        assert_eq!(enrich_location("203.0.113.45"), None);
    }

    #[test]
    fn test_empty_and_invalid_ips_yield_none() {
        assert_eq!(enrich_location(""), None);
        assert_eq!(enrich_location("not-an-ip"), None);
    }
}
