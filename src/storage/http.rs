//! HTTP collaborators built on `reqwest`'s blocking client.
//!
//! Workers run on rayon threads, not an async runtime, so the blocking
//! client is the natural fit. Every request carries the client's timeout,
//! which keeps one stalled item from holding up the batch join.

use super::{BlobFetcher, FetchedBlob, ObjectStore, StoreError, StoredObject};
use super::{content_type_for, public_location};
use crate::naming::StoredNameGenerator;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

fn client_with_timeout(timeout: Duration) -> Result<Client, StoreError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// GETs source images.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, StoreError> {
        Ok(Self {
            client: client_with_timeout(timeout)?,
        })
    }
}

impl BlobFetcher for HttpFetcher {
    fn fetch(&self, location: &str) -> Result<FetchedBlob, StoreError> {
        let response = self.client.get(location).send()?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        // The body of an error response is never used
        let bytes = if status.is_success() {
            response.bytes()?.to_vec()
        } else {
            Vec::new()
        };
        Ok(FetchedBlob {
            bytes,
            content_type,
            status: status.as_u16(),
        })
    }
}

/// PUTs objects to `<endpoint>/<prefix><stored name>` (S3-style presigned
/// buckets, MinIO, or any HTTP blob service) and publishes them under
/// `public_base_url`.
pub struct HttpObjectStore {
    client: Client,
    endpoint: String,
    prefix: String,
    public_base_url: String,
    names: StoredNameGenerator,
}

impl HttpObjectStore {
    pub fn new(
        endpoint: impl Into<String>,
        prefix: impl Into<String>,
        public_base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            client: client_with_timeout(timeout)?,
            endpoint: endpoint.into(),
            prefix: prefix.into(),
            public_base_url: public_base_url.into(),
            names: StoredNameGenerator::new(),
        })
    }
}

impl ObjectStore for HttpObjectStore {
    fn put(&self, bytes: &[u8], name_hint: &str) -> Result<StoredObject, StoreError> {
        let name = self.names.stored_name(name_hint);
        let target = public_location(&self.endpoint, &self.prefix, &name);
        self.client
            .put(&target)
            .header(CONTENT_TYPE, content_type_for(&name))
            .body(bytes.to_vec())
            .send()?
            .error_for_status()?;
        Ok(StoredObject {
            location: public_location(&self.public_base_url, &self.prefix, &name),
            name,
        })
    }
}
