//! Origin validation (§4.5): the static and dynamic CORS/streaming-upgrade
//! allow-list, and the algorithm that decides whether a browser `Origin`
//! header may open a streaming session or issue a cross-origin POST.

use std::net::IpAddr;

/// The fixed mobile-runtime origins every instance trusts regardless of
/// configuration (§4.5 static allow-list, item a).
const FIXED_MOBILE_ORIGINS: &[&str] =
    &["capacitor://localhost", "ionic://localhost", "http://localhost", "https://localhost"];

/// Build the static allow-list (§4.5 a-d): fixed mobile-runtime origins,
/// `localhost`/`127.0.0.1` at the API port, each local NIC IP, and the
/// mDNS/OS hostname, each as `<h>` and `<h>:<port>` under both schemes.
pub fn build_static_allowlist(api_port: u16, mdns_hostname: Option<&str>) -> Vec<String> {
    let mut list: Vec<String> = FIXED_MOBILE_ORIGINS.iter().map(|s| s.to_lowercase()).collect();

    for scheme in ["http", "https"] {
        list.push(format!("{scheme}://localhost:{api_port}"));
        list.push(format!("{scheme}://127.0.0.1:{api_port}"));
    }

    for ip in local_nic_ips() {
        for scheme in ["http", "https"] {
            list.push(format!("{scheme}://{ip}"));
            list.push(format!("{scheme}://{ip}:{api_port}"));
        }
    }

    let mut hostnames: Vec<String> = Vec::new();
    if let Some(h) = mdns_hostname {
        hostnames.push(h.to_owned());
    }
    if let Ok(os_hostname) = hostname_from_os() {
        hostnames.push(os_hostname);
    }
    for h in hostnames {
        for scheme in ["http", "https"] {
            list.push(format!("{scheme}://{h}"));
            list.push(format!("{scheme}://{h}:{api_port}"));
        }
    }

    list.into_iter().map(|s| s.to_lowercase()).collect()
}

fn local_nic_ips() -> Vec<IpAddr> {
    if_addrs::get_if_addrs()
        .unwrap_or_default()
        .into_iter()
        .map(|i| i.ip())
        .filter(|ip| !ip.is_loopback())
        .collect()
}

fn hostname_from_os() -> std::io::Result<String> {
    // `hostname::get()` isn't in the workspace dependency set; the
    // platform hostname is read the same way the static-site-serving
    // teacher code reads process-environment facts, via `std::env` on
    // platforms that export it, falling back to a best-effort probe.
    std::env::var("HOSTNAME")
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "HOSTNAME not set"))
        .or_else(|_| std::fs::read_to_string("/etc/hostname").map(|s| s.trim().to_owned()))
}

/// Expand one configured dynamic allow-list entry into its origin
/// variants (§4.5 dynamic allow-list).
pub fn expand_dynamic_entry(raw: &str, api_port: u16) -> Vec<String> {
    let entry = raw.trim().trim_end_matches('/');
    if entry.is_empty() {
        return Vec::new();
    }

    if let Some((scheme, rest)) = entry.split_once("://") {
        if !is_valid_scheme(scheme) {
            // Not actually a scheme-prefixed entry (e.g. malformed input
            // like `http://http://host`); treat the whole thing as an
            // opaque bare host below instead of misparsing it.
            return expand_bare_host(entry, api_port);
        }
        let mut variants = vec![entry.to_lowercase()];
        if (scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https"))
            && !has_port(rest)
        {
            variants.push(format!("{scheme}://{rest}:{api_port}").to_lowercase());
        }
        return variants;
    }

    expand_bare_host(entry, api_port)
}

fn expand_bare_host(host: &str, api_port: u16) -> Vec<String> {
    vec![
        format!("http://{host}").to_lowercase(),
        format!("https://{host}").to_lowercase(),
        format!("http://{host}:{api_port}").to_lowercase(),
        format!("https://{host}:{api_port}").to_lowercase(),
    ]
}

fn has_port(host_and_maybe_port: &str) -> bool {
    // IPv6 literals (`[::1]:7497`) aside: reader transports here are
    // plain hostnames/IPv4, so a bare colon is sufficient.
    host_and_maybe_port.contains(':')
}

/// Scheme validity per §8: starts with a letter, then `[A-Za-z0-9+.-]*`.
pub fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '.' || c == '-')
}

/// A parsed `Origin` header: scheme, host, optional port.
struct ParsedOrigin<'a> {
    scheme: &'a str,
    host: &'a str,
    port: Option<u16>,
}

fn parse_origin(origin: &str) -> Option<ParsedOrigin<'_>> {
    let (scheme, rest) = origin.split_once("://")?;
    if !is_valid_scheme(scheme) {
        return None;
    }
    match rest.rsplit_once(':') {
        Some((host, port_str)) => {
            if let Ok(port) = port_str.parse::<u16>() {
                Some(ParsedOrigin { scheme, host, port: Some(port) })
            } else {
                Some(ParsedOrigin { scheme, host: rest, port: None })
            }
        }
        None => Some(ParsedOrigin { scheme, host: rest, port: None }),
    }
}

fn is_private_or_link_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local(),
        IpAddr::V6(_) => false,
    }
}

/// The origin validator: holds the static allow-list computed once at
/// startup; the dynamic list is expanded fresh per call from whatever
/// configuration currently holds (§4.5 "fetched per request").
pub struct OriginValidator {
    static_list: Vec<String>,
    api_port: u16,
}

impl OriginValidator {
    pub fn new(api_port: u16, mdns_hostname: Option<&str>) -> Self {
        Self { static_list: build_static_allowlist(api_port, mdns_hostname), api_port }
    }

    /// Validate `origin` against the static list, a freshly-expanded
    /// dynamic list (`dynamic_entries`), then the algorithmic fallbacks
    /// (§4.5 validation algorithm, steps 1-5).
    pub fn is_allowed(&self, origin: &str, dynamic_entries: &[String]) -> bool {
        // Step 1: empty origin (same-origin request) is always allowed.
        if origin.is_empty() {
            return true;
        }

        let lower = origin.to_lowercase();

        // Step 2: static or expanded-dynamic allow-list, case-insensitive.
        if self.static_list.iter().any(|o| o == &lower) {
            return true;
        }
        if dynamic_entries
            .iter()
            .any(|entry| expand_dynamic_entry(entry, self.api_port).iter().any(|o| o == &lower))
        {
            return true;
        }

        let Some(parsed) = parse_origin(&lower) else { return false };

        // Step 3: localhost/127.0.0.1 on any port.
        if parsed.host == "localhost" || parsed.host == "127.0.0.1" {
            return true;
        }

        // Step 4: RFC 1918 + link-local private IPs, only on the exact API port.
        if let Ok(ip) = parsed.host.parse::<IpAddr>() {
            if is_private_or_link_local(&ip) {
                return parsed.port == Some(self.api_port);
            }
        }

        // Step 5: otherwise reject.
        false
    }
}

#[cfg(test)]
#[path = "origin_tests.rs"]
mod tests;
