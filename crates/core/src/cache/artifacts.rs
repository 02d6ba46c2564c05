//! Artifact rows: create-if-absent writes and expiry-aware reads.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::store::ArtifactStore;
use crate::Error;
use crate::artifact::{Artifact, Bounds, SiteMetadata, Thumbnail};

/// Column values of one `artifacts` row.
#[derive(Debug, Default)]
struct ArtifactRow {
    kind: String,
    site_json: Option<String>,
    thumbnail: Option<Vec<u8>>,
    thumbnail_mime: Option<String>,
    width: Option<i64>,
    height: Option<i64>,
    reason: Option<String>,
}

impl ArtifactRow {
    fn from_artifact(artifact: &Artifact) -> Result<Self, Error> {
        let mut row = ArtifactRow { kind: artifact.kind().to_string(), ..Default::default() };

        if let Some(site) = artifact.site() {
            row.site_json =
                Some(serde_json::to_string(site).map_err(|e| Error::CorruptEntry(format!("site metadata: {e}")))?);
        }
        if let Some(thumbnail) = artifact.thumbnail() {
            row.thumbnail = Some(thumbnail.bytes.clone());
            row.thumbnail_mime = Some(thumbnail.mime.clone());
            row.width = Some(i64::from(thumbnail.bounds.width));
            row.height = Some(i64::from(thumbnail.bounds.height));
        }
        if let Artifact::Unavailable { reason, .. } = artifact {
            row.reason = Some(reason.clone());
        }

        Ok(row)
    }

    fn into_artifact(self) -> Result<Artifact, Error> {
        let site = self
            .site_json
            .as_deref()
            .map(serde_json::from_str::<SiteMetadata>)
            .transpose()
            .map_err(|e| Error::CorruptEntry(format!("site metadata: {e}")))?;

        let thumbnail = match (self.thumbnail, self.thumbnail_mime) {
            (Some(bytes), Some(mime)) => Some(Thumbnail {
                bytes,
                mime,
                bounds: Bounds { width: dimension(self.width)?, height: dimension(self.height)? },
            }),
            _ => None,
        };

        match (self.kind.as_str(), site, thumbnail) {
            ("page", Some(site), Some(thumbnail)) => Ok(Artifact::Page { site, thumbnail }),
            ("image", _, Some(thumbnail)) => Ok(Artifact::Image { thumbnail }),
            ("unavailable", site, _) => Ok(Artifact::Unavailable { site, reason: self.reason.unwrap_or_default() }),
            (kind, _, _) => Err(Error::CorruptEntry(format!("incomplete {kind} row"))),
        }
    }
}

fn dimension(value: Option<i64>) -> Result<u32, Error> {
    value
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| Error::CorruptEntry("thumbnail bounds".into()))
}

fn timestamp(at: chrono::DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl CacheDb {
    /// Get a live artifact by key.
    ///
    /// Returns None if the key is absent or its entry has expired.
    pub async fn get_artifact(&self, key: &str) -> Result<Option<Artifact>, Error> {
        let key = key.to_string();
        let now = timestamp(Utc::now());
        let row = self
            .conn
            .call(move |conn| -> Result<Option<ArtifactRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT kind, site_json, thumbnail, thumbnail_mime, width, height, reason
                     FROM artifacts WHERE key = ?1 AND expires_at > ?2",
                )?;

                let result = stmt.query_row(params![key, now], |row| {
                    Ok(ArtifactRow {
                        kind: row.get(0)?,
                        site_json: row.get(1)?,
                        thumbnail: row.get(2)?,
                        thumbnail_mime: row.get(3)?,
                        width: row.get(4)?,
                        height: row.get(5)?,
                        reason: row.get(6)?,
                    })
                });

                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(ArtifactRow::into_artifact).transpose()
    }

    /// Insert an artifact unless a live entry already holds the key.
    ///
    /// An expired entry for the key is removed first, in the same
    /// connection call, so it never blocks a fresh write.
    ///
    /// Returns `true` if this call stored the artifact.
    pub async fn insert_artifact_if_absent(&self, key: &str, artifact: &Artifact, ttl: Duration) -> Result<bool, Error> {
        let row = ArtifactRow::from_artifact(artifact)?;
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| Error::InvalidInput(format!("ttl: {e}")))?;
        let key = key.to_string();
        let now = Utc::now();
        let created_at = timestamp(now);
        let expires_at = timestamp(now + ttl);

        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM artifacts WHERE key = ?1 AND expires_at <= ?2", params![key, created_at])?;
                let inserted = tx.execute(
                    "INSERT INTO artifacts (
                        key, kind, site_json, thumbnail, thumbnail_mime,
                        width, height, reason, created_at, expires_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    ON CONFLICT(key) DO NOTHING",
                    params![
                        key,
                        row.kind,
                        row.site_json,
                        row.thumbnail,
                        row.thumbnail_mime,
                        row.width,
                        row.height,
                        row.reason,
                        created_at,
                        expires_at,
                    ],
                )?;
                tx.commit()?;
                Ok(inserted == 1)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete expired artifacts.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_expired(&self) -> Result<u64, Error> {
        let now = timestamp(Utc::now());
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM artifacts WHERE expires_at <= ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl ArtifactStore for CacheDb {
    async fn get(&self, key: &str) -> Result<Option<Artifact>, Error> {
        self.get_artifact(key).await
    }

    async fn put(&self, key: &str, artifact: &Artifact, ttl: Duration) -> Result<bool, Error> {
        self.insert_artifact_if_absent(key, artifact, ttl).await
    }
}
