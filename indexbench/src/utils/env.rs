/// Identifier used as `User-Agent` for outbound requests
/// and as `Server` header value for the mock server.
pub const fn network_service_identifier() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
}
