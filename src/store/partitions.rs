//! Key layout for the job store keyspace.
//!
//! Every partition tags its keys with a short prefix so a raw keyspace dump
//! stays greppable:
//!
//! - `jobs`: `j/{job_id}` -> JobRecord (JSON)
//! - `idempotency`: `i/{client key}` -> job id
//! - `metadata`: `m/{name}` -> scalar

const JOB_TAG: &str = "j/";
const IDEM_TAG: &str = "i/";
const META_TAG: &str = "m/";

/// Key for a job record: `j/{job_id}`
pub fn job_key(job_id: &str) -> Vec<u8> {
    tagged(JOB_TAG, job_id)
}

/// Key for a client idempotency mapping: `i/{client key}`
pub fn idempotency_key(client_key: &str) -> Vec<u8> {
    tagged(IDEM_TAG, client_key)
}

/// Key for store metadata (pruning cursors): `m/{name}`
pub fn meta_key(name: &str) -> Vec<u8> {
    tagged(META_TAG, name)
}

fn tagged(tag: &str, rest: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(tag.len() + rest.len());
    key.extend_from_slice(tag.as_bytes());
    key.extend_from_slice(rest.as_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(job_key("0192f7a1-44aa"), b"j/0192f7a1-44aa");
        assert_eq!(idempotency_key("retry-1"), b"i/retry-1");
        assert_eq!(meta_key("last_prune_idem"), b"m/last_prune_idem");
    }

    #[test]
    fn test_tags_keep_same_name_disjoint() {
        // The same logical name must never collide across partitions
        assert_ne!(job_key("x"), idempotency_key("x"));
        assert_ne!(idempotency_key("x"), meta_key("x"));
        assert_ne!(meta_key("x"), job_key("x"));
    }
}
