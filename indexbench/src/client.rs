use std::time::Duration;

use rama::{
    Layer as _, Service as _,
    error::BoxError,
    http::{
        HeaderValue, Request, Response,
        client::EasyHttpWebClient,
        layer::{
            decompression::DecompressionLayer, map_request_body::MapRequestBodyLayer,
            map_response_body::MapResponseBodyLayer,
            required_header::AddRequiredRequestHeadersLayer, timeout::TimeoutLayer,
        },
    },
    layer::MapErrLayer,
    service::BoxService,
};

use crate::utils::env::network_service_identifier;

/// Web client used to query both endpoint variants.
///
/// No retries: a failed request is reported as such.
/// Without a `timeout` the transport defaults apply.
pub fn new_web_client(timeout: Option<Duration>) -> BoxService<Request, Response, BoxError> {
    let inner_https_client = EasyHttpWebClient::default();

    let client_middleware = (
        MapResponseBodyLayer::new_boxed_streaming_body(),
        DecompressionLayer::new(),
        MapErrLayer::new(Into::<BoxError>::into),
        timeout.map(TimeoutLayer::new),
        AddRequiredRequestHeadersLayer::new()
            .with_user_agent_header_value(HeaderValue::from_static(network_service_identifier())),
        MapRequestBodyLayer::new_boxed_streaming_body(),
    );

    client_middleware.into_layer(inner_https_client).boxed()
}
