//! Reverse name resolution with a short-label, address-fallback policy.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait NameResolver: Send + Sync {
    /// The fully-qualified reverse name, or `None` when resolution failed.
    async fn reverse(&self, addr: IpAddr) -> Option<String>;
}

/// Reverse DNS through the system resolver, on the blocking pool.
pub struct DnsResolver {
    timeout: Duration,
}

impl DnsResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl NameResolver for DnsResolver {
    async fn reverse(&self, addr: IpAddr) -> Option<String> {
        let lookup = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&addr));
        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(Ok(name))) => Some(name),
            Ok(Ok(Err(e))) => {
                tracing::debug!(address = %addr, error = %e, "Reverse lookup failed");
                None
            }
            Ok(Err(e)) => {
                tracing::debug!(address = %addr, error = %e, "Reverse lookup task aborted");
                None
            }
            Err(_) => {
                tracing::debug!(address = %addr, "Reverse lookup timed out");
                None
            }
        }
    }
}

/// Resolve to a short display name: the leading label of the reverse name,
/// or the address text when nothing usable came back.
pub async fn short_name(resolver: &dyn NameResolver, addr: IpAddr) -> String {
    resolver
        .reverse(addr)
        .await
        .and_then(|fqdn| leading_label(&fqdn, addr))
        .unwrap_or_else(|| addr.to_string())
}

fn leading_label(fqdn: &str, addr: IpAddr) -> Option<String> {
    let fqdn = fqdn.trim().trim_end_matches('.');
    // Resolvers without a PTR record often echo the address back.
    if fqdn.is_empty() || fqdn == addr.to_string() {
        return None;
    }
    fqdn.split('.')
        .next()
        .filter(|label| !label.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Option<&'static str>);

    #[async_trait]
    impl NameResolver for Fixed {
        async fn reverse(&self, _addr: IpAddr) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    #[tokio::test]
    async fn test_keeps_leading_label() {
        let addr: IpAddr = "10.0.0.5".parse().unwrap();
        let name = short_name(&Fixed(Some("web-01.corp.example.com.")), addr).await;
        assert_eq!(name, "web-01");
    }

    #[tokio::test]
    async fn test_falls_back_to_address() {
        let addr: IpAddr = "10.0.0.5".parse().unwrap();
        assert_eq!(short_name(&Fixed(None), addr).await, "10.0.0.5");
        assert_eq!(short_name(&Fixed(Some("10.0.0.5")), addr).await, "10.0.0.5");
        assert_eq!(short_name(&Fixed(Some("")), addr).await, "10.0.0.5");
    }
}
