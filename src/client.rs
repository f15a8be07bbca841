//! Persisted-query client for the remote library ("is saved" lookups and
//! add/remove mutations).

use serde::Serialize;
use serde_json::Value;

use crate::config::{ApiConfig, OperationsConfig, PersistedOperation};
use crate::credentials::Credentials;
use crate::error::Result;
use crate::track::TrackId;

/// Sends one JSON POST and returns the decoded response body.
///
/// Implementations map transport failures to `SyncError::Network` and
/// non-success statuses to `SyncError::Status`.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn post_query(
        &self,
        endpoint: &str,
        headers: &[(String, String)],
        body: String,
    ) -> Result<Value>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody<'a> {
    variables: Variables<'a>,
    operation_name: &'a str,
    extensions: Extensions<'a>,
}

#[derive(Serialize)]
struct Variables<'a> {
    uris: Vec<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Extensions<'a> {
    persisted_query: PersistedQuery<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersistedQuery<'a> {
    version: u32,
    sha256_hash: &'a str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LibraryMutation {
    Add,
    Remove,
}

pub struct SavedStateClient<T> {
    transport: T,
    api: ApiConfig,
    operations: OperationsConfig,
}

impl<T: Transport> SavedStateClient<T> {
    pub fn new(transport: T, api: ApiConfig, operations: OperationsConfig) -> Self {
        Self {
            transport,
            api,
            operations,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Looks up the saved flag of every id, in input order.
    ///
    /// The result always has `ids.len()` entries; anything the response
    /// does not answer cleanly reads as `false`.
    pub async fn check_saved(&self, ids: &[TrackId], creds: &Credentials) -> Result<Vec<bool>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let response = self.send(&self.operations.lookup, ids, creds).await?;
        Ok(parse_lookup(&response, ids.len()))
    }

    pub async fn add_saved(&self, id: &TrackId, creds: &Credentials) -> Result<()> {
        self.mutate(id, LibraryMutation::Add, creds).await
    }

    pub async fn remove_saved(&self, id: &TrackId, creds: &Credentials) -> Result<()> {
        self.mutate(id, LibraryMutation::Remove, creds).await
    }

    pub async fn mutate(
        &self,
        id: &TrackId,
        mutation: LibraryMutation,
        creds: &Credentials,
    ) -> Result<()> {
        let operation = match mutation {
            LibraryMutation::Add => &self.operations.add,
            LibraryMutation::Remove => &self.operations.remove,
        };
        self.send(operation, std::slice::from_ref(id), creds).await?;
        Ok(())
    }

    async fn send(
        &self,
        operation: &PersistedOperation,
        ids: &[TrackId],
        creds: &Credentials,
    ) -> Result<Value> {
        let body = serde_json::to_string(&QueryBody {
            variables: Variables {
                uris: ids.iter().map(TrackId::as_str).collect(),
            },
            operation_name: &operation.name,
            extensions: Extensions {
                persisted_query: PersistedQuery {
                    version: 1,
                    sha256_hash: &operation.sha256_hash,
                },
            },
        })?;
        let headers = request_headers(&self.api, creds);
        log::debug!("{} for {} track(s)", operation.name, ids.len());
        self.transport
            .post_query(&self.api.query_endpoint, &headers, body)
            .await
    }
}

fn request_headers(api: &ApiConfig, creds: &Credentials) -> Vec<(String, String)> {
    let mut headers = vec![
        (
            "Content-Type".to_string(),
            "application/json;charset=UTF-8".to_string(),
        ),
        ("app-platform".to_string(), api.app_platform.clone()),
    ];
    if let Some(token) = &creds.auth_token {
        headers.push(("authorization".to_string(), format!("Bearer {token}")));
    }
    if let Some(token) = &creds.client_token {
        headers.push(("client-token".to_string(), token.clone()));
    }
    headers
}

/// Maps `data.lookup[i].data.saved` onto exactly `expected` booleans.
pub fn parse_lookup(response: &Value, expected: usize) -> Vec<bool> {
    let items = response
        .pointer("/data/lookup")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut saved: Vec<bool> = items
        .iter()
        .take(expected)
        .map(|item| {
            item.pointer("/data/saved")
                .and_then(Value::as_bool)
                .unwrap_or(false)
        })
        .collect();
    saved.resize(expected, false);
    saved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::error::SyncError;
    use crate::testing::FakeLibrary;
    use serde_json::json;

    fn ids(raw: &[&str]) -> Vec<TrackId> {
        raw.iter().map(|id| TrackId::from_base62(id).unwrap()).collect()
    }

    fn client(library: FakeLibrary) -> SavedStateClient<FakeLibrary> {
        let config = SyncConfig::default();
        SavedStateClient::new(library, config.api, config.operations)
    }

    fn full_creds() -> Credentials {
        Credentials {
            auth_token: Some("tok".to_string()),
            client_token: Some("ct".to_string()),
        }
    }

    #[test]
    fn lookup_with_null_item_reads_false() {
        let response = json!({"data": {"lookup": [{"data": {"saved": true}}, null]}});
        assert_eq!(parse_lookup(&response, 2), vec![true, false]);
    }

    #[test]
    fn lookup_shape_deviations_degrade_to_false() {
        assert_eq!(parse_lookup(&json!({}), 2), vec![false, false]);
        assert_eq!(parse_lookup(&json!({"data": {"lookup": "nope"}}), 1), vec![false]);
        let response = json!({"data": {"lookup": [
            {"data": {"saved": "yes"}},
            {"data": {"saved": true}},
            {"data": {"saved": true}},
        ]}});
        assert_eq!(parse_lookup(&response, 2), vec![false, true]);
    }

    #[tokio::test]
    async fn empty_lookup_skips_the_network() {
        let client = client(FakeLibrary::default());
        let result = client.check_saved(&[], &full_creds()).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(client.transport().call_count(), 0);
    }

    #[tokio::test]
    async fn lookup_preserves_order_and_length() {
        let library = FakeLibrary::with_saved(&["b", "d"]);
        let client = client(library);
        let request = ids(&["a", "b", "c", "d", "b"]);
        let result = client.check_saved(&request, &full_creds()).await.unwrap();
        assert_eq!(result, vec![false, true, false, true, true]);
        assert_eq!(client.transport().call_count(), 1);

        let call = client.transport().last_call().unwrap();
        assert_eq!(call.body["operationName"], "areEntitiesInLibrary");
        assert_eq!(call.body["extensions"]["persistedQuery"]["version"], 1);
        assert_eq!(
            call.body["variables"]["uris"][0],
            "spotify:track:a"
        );
    }

    #[tokio::test]
    async fn mutation_round_trip() {
        let client = client(FakeLibrary::default());
        let track = ids(&["zz9"]);
        client.add_saved(&track[0], &full_creds()).await.unwrap();
        assert_eq!(client.check_saved(&track, &full_creds()).await.unwrap(), vec![true]);

        let calls = client.transport().calls();
        let call = &calls[0];
        assert_eq!(call.body["operationName"], "addToLibrary");
        assert_eq!(
            call.body["extensions"]["persistedQuery"]["sha256Hash"],
            "a3c1ff58e6a36fec5fe1e3a193dc95d9071d96b9ba53c5ba9c1494fb1ee73915"
        );

        client.remove_saved(&track[0], &full_creds()).await.unwrap();
        assert_eq!(client.check_saved(&track, &full_creds()).await.unwrap(), vec![false]);
    }

    #[tokio::test]
    async fn partial_credentials_still_send() {
        let library = FakeLibrary::default();
        library.require_auth();
        let client = client(library);
        let creds = Credentials {
            auth_token: None,
            client_token: Some("ct".to_string()),
        };

        let err = client.check_saved(&ids(&["a"]), &creds).await.unwrap_err();
        assert!(matches!(err, SyncError::Status(401)));

        let call = client.transport().last_call().unwrap();
        assert!(call.header("authorization").is_none());
        assert_eq!(call.header("client-token"), Some("ct"));
        assert_eq!(call.header("app-platform"), Some("WebPlayer"));
    }
}
