//! Policy edit engine
//!
//! Every change to a bucket policy is a transaction: fetch the stored document, transform it,
//! write it back in full. [`PolicyEditor::with_policy`] runs that transaction; grant and revoke
//! are the two transforms built on top of it.
//!
//! When the backend supports conditional writes the write is tied to the revision that was
//! read, and a write that loses against a concurrent writer re-runs the whole transaction up to
//! `max_conflict_retries` times. Otherwise the write is unconditional and a concurrent edit of
//! the same document may be lost.

use crate::backend::{Backend, WriteCondition};
use crate::error::CosiResult;
use crate::identity::lookup_user;

use s3iam_policy::{ActionList, Policy, Statement};

use tracing::{debug, info, warn};

/// What a transform wants done with the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyEdit {
    /// Leave the stored document as it is.
    Unchanged,
    /// Replace the stored document, or create it if there is none.
    Put(Policy),
    /// Remove the stored document.
    Delete,
}

/// What a transaction did to the stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyOutcome {
    Unchanged,
    Created,
    Updated,
    Deleted,
}

pub struct PolicyEditor<'a> {
    backend: &'a dyn Backend,
    max_conflict_retries: u32,
}

impl<'a> PolicyEditor<'a> {
    #[must_use]
    pub fn new(backend: &'a dyn Backend, max_conflict_retries: u32) -> Self {
        Self {
            backend,
            max_conflict_retries,
        }
    }

    /// Fetches the document of `bucket`, hands it to `f` and applies the edit `f` returns.
    ///
    /// `f` sees `None` if the bucket has no document. It may run more than once when
    /// conditional writes lose against a concurrent writer.
    ///
    /// # Errors
    /// + `FormatError` if the stored document does not parse.
    /// + `Conflict` if the write still loses after all retries.
    /// + Any error returned by `f` or by the backend.
    pub async fn with_policy<F>(&self, bucket: &str, mut f: F) -> CosiResult<PolicyOutcome>
    where
        F: FnMut(Option<&Policy>) -> CosiResult<PolicyEdit> + Send,
    {
        let mut attempt = 0;
        loop {
            match self.try_edit(bucket, &mut f).await {
                Err(e) if e.is_conflict() && attempt < self.max_conflict_retries => {
                    attempt += 1;
                    warn!(bucket, attempt, "policy changed concurrently, retrying");
                }
                ret => return ret,
            }
        }
    }

    async fn try_edit<F>(&self, bucket: &str, f: &mut F) -> CosiResult<PolicyOutcome>
    where
        F: FnMut(Option<&Policy>) -> CosiResult<PolicyEdit> + Send,
    {
        let stored = match self.backend.get_policy(bucket).await {
            Ok(stored) => Some(stored),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        let (current, etag) = match stored {
            Some(stored) => {
                let policy = Policy::parse(stored.document.as_bytes()).map_err(|e| {
                    tracing::error!(bucket, error = %e, "stored policy does not parse");
                    crate::CosiError::from(e)
                })?;
                (Some(policy), stored.etag)
            }
            None => (None, None),
        };

        let condition = if self.backend.supports_conditional_writes() {
            match (&current, etag) {
                (None, _) => WriteCondition::IfAbsent,
                (Some(_), Some(etag)) => WriteCondition::IfMatch(etag),
                (Some(_), None) => WriteCondition::None,
            }
        } else {
            WriteCondition::None
        };

        match f(current.as_ref())? {
            PolicyEdit::Unchanged => Ok(PolicyOutcome::Unchanged),
            PolicyEdit::Put(policy) => {
                let document = policy.to_json()?;
                self.backend.put_policy(bucket, &document, condition).await?;
                if current.is_some() {
                    info!(bucket, statements = policy.statement.len(), "updated bucket policy");
                    Ok(PolicyOutcome::Updated)
                } else {
                    info!(bucket, statements = policy.statement.len(), "created bucket policy");
                    Ok(PolicyOutcome::Created)
                }
            }
            PolicyEdit::Delete => {
                if current.is_none() {
                    return Ok(PolicyOutcome::Unchanged);
                }
                match self.backend.delete_policy(bucket, condition).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => debug!(bucket, "bucket policy already deleted"),
                    Err(e) => return Err(e),
                }
                info!(bucket, "deleted bucket policy");
                Ok(PolicyOutcome::Deleted)
            }
        }
    }

    /// Grants `actions` on `bucket` to the user `user_name`.
    ///
    /// A missing document is created. A document that already names the user is left alone,
    /// whatever actions its statement grants.
    ///
    /// # Errors
    /// Returns `NotFound` if the user does not exist.
    pub async fn add_principal(&self, bucket: &str, user_name: &str, actions: &ActionList) -> CosiResult<PolicyOutcome> {
        let Some(user) = lookup_user(self.backend, user_name).await? else {
            return Err(cosi_error!(NotFound, "user {user_name} does not exist"));
        };
        let user_id = user.id;

        self.with_policy(bucket, |current| {
            let mut policy = match current {
                Some(policy) if policy.contains_principal(&user_id) => {
                    info!(bucket, user = user_name, "user is already in bucket policy");
                    return Ok(PolicyEdit::Unchanged);
                }
                Some(policy) => policy.clone(),
                None => {
                    info!(bucket, "bucket has no policy, creating one");
                    Policy::new()
                }
            };
            policy.push(Statement::allow(user_id.as_str(), actions.clone(), bucket));
            Ok(PolicyEdit::Put(policy))
        })
        .await
    }

    /// Drops the user `user_name` from the document of `bucket`.
    ///
    /// Statements left without principals are removed, and a document left without statements
    /// is deleted. A missing document or user is not an error.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    pub async fn remove_principal(&self, bucket: &str, user_name: &str) -> CosiResult<PolicyOutcome> {
        let Some(user) = lookup_user(self.backend, user_name).await? else {
            info!(bucket, user = user_name, "user does not exist, bucket policy left unchanged");
            return Ok(PolicyOutcome::Unchanged);
        };
        let user_id = user.id;

        self.with_policy(bucket, |current| {
            let Some(policy) = current else {
                info!(bucket, "bucket has no policy, nothing to revoke");
                return Ok(PolicyEdit::Unchanged);
            };
            if !policy.contains_principal(&user_id) {
                info!(bucket, user = user_name, "user is not in bucket policy");
                return Ok(PolicyEdit::Unchanged);
            }
            let policy = policy.without_principal(&user_id);
            if policy.is_empty() {
                info!(bucket, "no statements left, deleting bucket policy");
                Ok(PolicyEdit::Delete)
            } else {
                Ok(PolicyEdit::Put(policy))
            }
        })
        .await
    }
}
