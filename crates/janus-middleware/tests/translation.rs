//! Round-trip properties of status translation.

use janus_core::{Codec, Code, JsonCodec, StatusError, YamlCodec};
use janus_middleware::{decode_http, encode_http, from_grpc_status, to_grpc_status};
use proptest::prelude::*;

fn canonical_error() -> impl Strategy<Value = StatusError> {
    (1_i32..=16, "[A-Za-z][A-Za-z0-9_]{0,31}", ".{0,64}")
        .prop_map(|(code, reason, message)| StatusError::from_raw(code, reason, message))
}

fn any_code_error() -> impl Strategy<Value = StatusError> {
    (any::<i32>(), "[A-Za-z][A-Za-z0-9_]{0,31}", ".{0,64}")
        .prop_map(|(code, reason, message)| StatusError::from_raw(code, reason, message))
}

fn printable_error() -> impl Strategy<Value = StatusError> {
    (1_i32..=16, "[A-Za-z][A-Za-z0-9_]{0,31}", "[ -~]{0,64}")
        .prop_map(|(code, reason, message)| StatusError::from_raw(code, reason, message))
}

proptest! {
    #[test]
    fn test_grpc_round_trip(err in canonical_error()) {
        let decoded = from_grpc_status(&to_grpc_status(&err));
        prop_assert_eq!(decoded, err);
    }

    #[test]
    fn test_grpc_round_trip_keeps_any_code(err in any_code_error()) {
        let decoded = from_grpc_status(&to_grpc_status(&err));
        prop_assert_eq!(decoded, err);
    }

    #[test]
    fn test_http_json_round_trip(err in canonical_error()) {
        let codec = JsonCodec;
        let (status, body) = encode_http(&err, &codec).unwrap();
        prop_assert_eq!(status, err.http_status());
        prop_assert_eq!(decode_http(status, &codec, &body).unwrap(), Some(err));
    }

    #[test]
    fn test_http_yaml_round_trip(err in printable_error()) {
        let codec = YamlCodec;
        let (status, body) = encode_http(&err, &codec).unwrap();
        prop_assert_eq!(decode_http(status, &codec, &body).unwrap(), Some(err));
    }
}

#[test]
fn test_every_code_survives_grpc() {
    for code in Code::all().into_iter().filter(|c| *c != Code::Ok) {
        let err = StatusError::new(code, "Reason", "message");
        let status = to_grpc_status(&err);
        assert_eq!(i32::from(status.code()), code.as_i32());
        assert_eq!(from_grpc_status(&status), err);
    }
}

#[test]
fn test_non_canonical_code_agrees_across_transports() {
    let err = StatusError::from_raw(77, "Custom", "custom failure");

    let over_grpc = from_grpc_status(&to_grpc_status(&err));
    let (status, body) = encode_http(&err, &JsonCodec).unwrap();
    let over_http = decode_http(status, &JsonCodec, &body).unwrap();

    assert_eq!(over_grpc, err);
    assert_eq!(over_http, Some(err));
}

#[test]
fn test_codec_trait_object_marshal() {
    let codec: &dyn Codec = &JsonCodec;
    let err = StatusError::aborted("Conflict", "retry");
    let bytes = codec.marshal(&err).unwrap();
    assert_eq!(codec.unmarshal::<StatusError>(&bytes).unwrap(), err);
}
