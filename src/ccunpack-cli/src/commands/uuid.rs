//! Uuid command handler

use anyhow::Result;

/// Print the canonical form of each id, one per line
pub fn expand(ids: &[String]) -> Result<()> {
    for id in ids {
        if !ccunpack::uuid::is_compressed(id) {
            tracing::warn!("{} is not a compressed uuid, printed unchanged", id);
        }
        println!("{}\t{}", id, ccunpack::decompress_uuid(id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand() {
        let ids = vec![
            "fcmR3XADNLgJ1ByKhqcC5Z".to_string(),
            "fc991dd7-0033-4b80-9d41-c8a86a702e59".to_string(),
        ];
        assert!(expand(&ids).is_ok());
    }
}
