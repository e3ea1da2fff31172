// Helper for generating UUIDv7 (timestamp-sortable UUIDs).
//
// Every table keys on UUIDv7 generated app-side, so ids sort by creation
// time and paging by id stays stable. The `jti` claim is the exception and
// uses v4: it only needs to be unpredictable.

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuidv7_is_valid() {
        let id = uuidv7();
        assert_eq!(id.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn later_ids_sort_after_earlier_ones() {
        let ids: Vec<Uuid> = (0..16).map(|_| uuidv7()).collect();
        assert!(ids.windows(2).all(|w| w[1] >= w[0]));
    }
}
