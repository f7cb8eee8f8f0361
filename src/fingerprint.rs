//! Request fingerprinting for deterministic replay matching

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use hyper::Uri;
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::http::Request;
use crate::{Result, UnderstudyError};

/// SHA-256 digest identifying a request for replay purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Wrap a raw digest
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First eight bytes in hex, for log lines
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = UnderstudyError;

    fn from_str(s: &str) -> Result<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| UnderstudyError::InvalidFormat(format!("Bad fingerprint '{s}': {e}")))?;
        Ok(Self(bytes))
    }
}

/// Which parts of a request count towards its fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintPolicy {
    /// Header names (case-insensitive) included in the fingerprint
    pub match_headers: Vec<String>,
    /// Query parameter names dropped before hashing
    pub ignore_query_params: Vec<String>,
    /// Leave the body out entirely
    pub ignore_body: bool,
    /// Canonicalize JSON bodies (sorted keys, no whitespace)
    pub normalize_json_body: bool,
}

impl Default for FingerprintPolicy {
    fn default() -> Self {
        Self {
            match_headers: Vec::new(),
            ignore_query_params: Vec::new(),
            ignore_body: false,
            normalize_json_body: true,
        }
    }
}

/// Compute the SHA-256 fingerprint of a request
///
/// The fingerprint covers, each length-prefixed:
/// 1. Method (uppercase)
/// 2. URL (see [`normalize_url`])
/// 3. Headers listed in the policy (lowercase names, trimmed values, sorted)
/// 4. Body (canonical JSON when enabled, unless ignored)
///
/// # Errors
///
/// Returns error if the URL is not absolute or cannot be parsed
pub fn fingerprint(request: &Request, policy: &FingerprintPolicy) -> Result<Fingerprint> {
    let mut hasher = Sha256::new();

    // 1. Method
    let method = request.method.trim().to_uppercase();
    update_field(&mut hasher, method.as_bytes());

    // 2. URL
    let url = normalize_url(&request.url, policy)?;
    update_field(&mut hasher, url.as_bytes());

    // 3. Selected headers
    let mut headers: Vec<(String, &str)> = request
        .headers
        .iter()
        .filter(|(name, _)| {
            policy
                .match_headers
                .iter()
                .any(|m| m.eq_ignore_ascii_case(name))
        })
        .map(|(name, value)| (name.to_lowercase(), value.trim()))
        .collect();
    headers.sort_unstable();
    hasher.update((headers.len() as u32).to_le_bytes());
    for (name, value) in &headers {
        update_field(&mut hasher, name.as_bytes());
        update_field(&mut hasher, value.as_bytes());
    }

    // 4. Body
    if policy.ignore_body {
        update_field(&mut hasher, &[]);
    } else if policy.normalize_json_body {
        let body = canonical_json(&request.body);
        update_field(&mut hasher, body.as_deref().unwrap_or(&request.body[..]));
    } else {
        update_field(&mut hasher, &request.body);
    }

    Ok(Fingerprint(hasher.finalize().into()))
}

fn update_field(hasher: &mut Sha256, data: &[u8]) {
    hasher.update((data.len() as u64).to_le_bytes());
    hasher.update(data);
}

/// Re-serialize a JSON body with sorted keys
///
/// Returns `None` when the body is not JSON or when re-serializing would
/// lose information (duplicate object keys). Number text is kept verbatim.
fn canonical_json(body: &[u8]) -> Option<Vec<u8>> {
    if body.is_empty() {
        return None;
    }
    serde_json::from_slice::<UniqueKeys>(body).ok()?;
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    serde_json::to_vec(&value).ok()
}

/// Accepts any JSON document whose objects have no repeated keys
struct UniqueKeys;

impl<'de> Deserialize<'de> for UniqueKeys {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(UniqueKeysVisitor)
    }
}

struct UniqueKeysVisitor;

impl<'de> Visitor<'de> for UniqueKeysVisitor {
    type Value = UniqueKeys;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value without duplicate keys")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> std::result::Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> std::result::Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> std::result::Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> std::result::Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_str<E: de::Error>(self, _: &str) -> std::result::Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<UniqueKeys, A::Error> {
        while seq.next_element::<UniqueKeys>()?.is_some() {}
        Ok(UniqueKeys)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<UniqueKeys, A::Error> {
        let mut seen = HashSet::new();
        while let Some(key) = map.next_key::<String>()? {
            if !seen.insert(key) {
                return Err(de::Error::custom("duplicate key"));
            }
            map.next_value::<UniqueKeys>()?;
        }
        Ok(UniqueKeys)
    }
}

/// Normalize an absolute URL for matching
///
/// Scheme and host are lowercased, default ports dropped, an empty path
/// becomes `/`, the fragment is removed, and query pairs are decoded,
/// filtered through the policy and sorted.
///
/// # Errors
///
/// Returns error if the URL is not absolute or cannot be parsed
pub fn normalize_url(url: &str, policy: &FingerprintPolicy) -> Result<String> {
    let without_fragment = url.trim().split('#').next().unwrap_or_default();
    let uri: Uri = without_fragment
        .parse()
        .map_err(|e| UnderstudyError::InvalidUrl(format!("'{url}': {e}")))?;

    let scheme = uri
        .scheme_str()
        .ok_or_else(|| UnderstudyError::InvalidUrl(format!("'{url}': missing scheme")))?
        .to_lowercase();
    let host = uri
        .host()
        .ok_or_else(|| UnderstudyError::InvalidUrl(format!("'{url}': missing host")))?
        .to_lowercase();

    // Userinfo selects the account, so it stays part of the identity
    let userinfo = uri
        .authority()
        .and_then(|a| a.as_str().rsplit_once('@'))
        .map(|(userinfo, _)| userinfo);

    let mut normalized = format!("{scheme}://");
    if let Some(userinfo) = userinfo {
        normalized.push_str(userinfo);
        normalized.push('@');
    }
    normalized.push_str(&host);
    match (scheme.as_str(), uri.port_u16()) {
        (_, None) | ("http", Some(80)) | ("https", Some(443)) => {}
        (_, Some(port)) => normalized.push_str(&format!(":{port}")),
    }

    let path = uri.path();
    if path.is_empty() {
        normalized.push('/');
    } else {
        normalized.push_str(path);
    }

    let query = normalize_query(uri.query().unwrap_or_default(), policy);
    if !query.is_empty() {
        normalized.push('?');
        normalized.push_str(&query);
    }

    Ok(normalized)
}

fn normalize_query(query: &str, policy: &FingerprintPolicy) -> String {
    let mut pairs: Vec<String> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .filter(|(key, _)| {
            decode_component(key)
                .map_or(true, |key| !policy.ignore_query_params.contains(&key))
        })
        .map(|(key, value)| {
            format!("{}={}", canonical_component(key), canonical_component(value))
        })
        .collect();
    pairs.sort();
    pairs.join("&")
}

fn decode_component(component: &str) -> Option<String> {
    let spaced = component.replace('+', " ");
    urlencoding::decode(&spaced).ok().map(std::borrow::Cow::into_owned)
}

/// Re-encoded form of a query component
///
/// Components that do not decode to UTF-8 are kept as sent behind a `!`,
/// which `urlencoding::encode` never emits, so they cannot collide with a
/// decoded value.
fn canonical_component(component: &str) -> String {
    match decode_component(component) {
        Some(decoded) => urlencoding::encode(&decoded).into_owned(),
        None => format!("!{component}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy() -> FingerprintPolicy {
        FingerprintPolicy::default()
    }

    fn fp(request: &Request) -> Fingerprint {
        fingerprint(request, &policy()).unwrap()
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let request = Request::get("http://example.com/api/test");
        assert_eq!(fp(&request), fp(&request), "Fingerprint must be deterministic");
    }

    #[test]
    fn test_fingerprint_different_methods() {
        let get = Request::get("http://example.com/api");
        let post = Request::post("http://example.com/api");
        assert_ne!(fp(&get), fp(&post));
    }

    #[test]
    fn test_method_case_insensitive() {
        let upper = Request::new("GET", "http://example.com/");
        let lower = Request::new("get", "http://example.com/");
        assert_eq!(fp(&upper), fp(&lower));
    }

    #[test]
    fn test_fingerprint_different_paths() {
        let v1 = Request::get("http://example.com/api/v1");
        let v2 = Request::get("http://example.com/api/v2");
        assert_ne!(fp(&v1), fp(&v2));
    }

    #[test]
    fn test_fingerprint_different_bodies() {
        let a = Request::post("http://example.com/").body("a");
        let b = Request::post("http://example.com/").body("b");
        assert_ne!(fp(&a), fp(&b));
    }

    #[test]
    fn test_headers_ignored_by_default() {
        let plain = Request::get("http://example.com/");
        let traced = Request::get("http://example.com/").header("X-Request-Id", "1234");
        assert_eq!(fp(&plain), fp(&traced));
    }

    #[test]
    fn test_matched_headers_order_and_case() {
        let policy = FingerprintPolicy {
            match_headers: vec!["accept".to_string(), "content-type".to_string()],
            ..FingerprintPolicy::default()
        };

        let a = Request::get("http://example.com/")
            .header("Content-Type", "application/json")
            .header("Accept", " text/plain ");
        let b = Request::get("http://example.com/")
            .header("accept", "text/plain")
            .header("content-type", "application/json");
        let c = Request::get("http://example.com/").header("accept", "text/html");

        assert_eq!(fingerprint(&a, &policy).unwrap(), fingerprint(&b, &policy).unwrap());
        assert_ne!(fingerprint(&a, &policy).unwrap(), fingerprint(&c, &policy).unwrap());
    }

    #[test]
    fn test_ignored_query_params() {
        let policy = FingerprintPolicy {
            ignore_query_params: vec!["ts".to_string()],
            ..FingerprintPolicy::default()
        };
        let a = Request::get("http://example.com/feed?page=2&ts=1700000000");
        let b = Request::get("http://example.com/feed?ts=1800000000&page=2");
        let c = Request::get("http://example.com/feed?page=3&ts=1700000000");

        assert_eq!(fingerprint(&a, &policy).unwrap(), fingerprint(&b, &policy).unwrap());
        assert_ne!(fingerprint(&a, &policy).unwrap(), fingerprint(&c, &policy).unwrap());
    }

    #[test]
    fn test_json_body_whitespace_and_key_order() {
        let a = Request::post("http://example.com/").body(r#"{"b": 2, "a": [1, 2]}"#);
        let b = Request::post("http://example.com/").body(r#"{"a":[1,2],"b":2}"#);
        assert_eq!(fp(&a), fp(&b));

        let raw = FingerprintPolicy {
            normalize_json_body: false,
            ..FingerprintPolicy::default()
        };
        assert_ne!(fingerprint(&a, &raw).unwrap(), fingerprint(&b, &raw).unwrap());
    }

    #[test]
    fn test_ignore_body() {
        let policy = FingerprintPolicy {
            ignore_body: true,
            ..FingerprintPolicy::default()
        };
        let a = Request::post("http://example.com/").body("one");
        let b = Request::post("http://example.com/").body("two");
        assert_eq!(fingerprint(&a, &policy).unwrap(), fingerprint(&b, &policy).unwrap());
    }

    #[test]
    fn test_url_normalization() {
        let p = policy();
        assert_eq!(normalize_url("http://example.com", &p).unwrap(), "http://example.com/");
        assert_eq!(
            normalize_url("http://Example.COM:80/Path", &p).unwrap(),
            "http://example.com/Path"
        );
        assert_eq!(
            normalize_url("https://example.com:443/", &p).unwrap(),
            "https://example.com/"
        );
        assert_eq!(
            normalize_url("http://example.com:8080/x", &p).unwrap(),
            "http://example.com:8080/x"
        );
        assert_eq!(
            normalize_url("http://example.com/s?q=a+b&flag#top", &p).unwrap(),
            "http://example.com/s?flag=&q=a%20b"
        );
    }

    #[test]
    fn test_json_big_integers_distinct() {
        let a = Request::post("http://example.com/").body(r#"{"id":12345678901234567890123}"#);
        let b = Request::post("http://example.com/").body(r#"{"id":12345678901234567890124}"#);
        assert_ne!(fp(&a), fp(&b));

        let spaced = Request::post("http://example.com/").body(r#"{ "id": 12345678901234567890123 }"#);
        assert_eq!(fp(&a), fp(&spaced));
    }

    #[test]
    fn test_json_number_text_preserved() {
        let int = Request::post("http://example.com/").body(r#"{"n":1}"#);
        let float = Request::post("http://example.com/").body(r#"{"n":1.0}"#);
        assert_ne!(fp(&int), fp(&float));
    }

    #[test]
    fn test_json_duplicate_keys_hashed_raw() {
        let dup = Request::post("http://example.com/").body(r#"{"a":1,"a":2}"#);
        let single = Request::post("http://example.com/").body(r#"{"a":2}"#);
        assert_ne!(fp(&dup), fp(&single));

        let nested = Request::post("http://example.com/").body(r#"[{"k":1,"k":1}]"#);
        assert!(canonical_json(&nested.body).is_none());
        assert!(canonical_json(br#"[{"k":1},{"k":1}]"#).is_some());
    }

    #[test]
    fn test_undecodable_query_kept_distinct() {
        let p = policy();
        let raw = Request::get("http://example.com/?x=%FF");
        let escaped = Request::get("http://example.com/?x=%25FF");
        assert_ne!(fp(&raw), fp(&escaped));
        assert_eq!(
            normalize_url("http://example.com/?x=%FF", &p).unwrap(),
            "http://example.com/?x=!%FF"
        );
        assert_eq!(
            normalize_url("http://example.com/?x=%25FF", &p).unwrap(),
            "http://example.com/?x=%25FF"
        );
    }

    #[test]
    fn test_userinfo_distinguishes() {
        let alice = Request::get("http://alice@example.com/");
        let bob = Request::get("http://bob@example.com/");
        let anonymous = Request::get("http://example.com/");
        assert_ne!(fp(&alice), fp(&bob));
        assert_ne!(fp(&alice), fp(&anonymous));
        assert_eq!(
            normalize_url("http://alice@Example.com:80/", &policy()).unwrap(),
            "http://alice@example.com/"
        );
    }

    #[test]
    fn test_relative_url_rejected() {
        let err = fingerprint(&Request::get("/api/test"), &policy()).unwrap_err();
        assert!(matches!(err, UnderstudyError::InvalidUrl(_)));
    }

    #[test]
    fn test_hex_round_trip() {
        let fingerprint = fp(&Request::get("http://example.com/"));
        let parsed: Fingerprint = fingerprint.to_hex().parse().unwrap();
        assert_eq!(parsed, fingerprint);
        assert_eq!(fingerprint.short().len(), 16);
        assert!("zz".parse::<Fingerprint>().is_err());
    }

    proptest! {
        #[test]
        fn prop_query_order_independent(
            mut pairs in proptest::collection::vec(("[a-z]{1,6}", "[a-z0-9]{0,6}"), 0..6)
        ) {
            let join = |pairs: &[(String, String)]| {
                pairs.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&")
            };
            let forward = Request::get(format!("http://example.com/q?{}", join(&pairs[..])));
            pairs.reverse();
            let backward = Request::get(format!("http://example.com/q?{}", join(&pairs[..])));

            prop_assert_eq!(fp(&forward), fp(&backward));
        }
    }
}
