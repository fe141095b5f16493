use crate::records::{BookTagRow, LegacyBookRecord};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Book id -> ids of the tags attached to it. Never holds an empty set.
pub type TagLinks = BTreeMap<Uuid, BTreeSet<Uuid>>;

/// Flattens the legacy book -> tags relationship into an id map.
///
/// Books and tag references without an id are ignored; whether the book
/// record itself converts is decided separately.
pub fn extract_associations(books: &[LegacyBookRecord]) -> TagLinks {
    let mut links = TagLinks::new();
    for book in books {
        let Some(book_id) = book.id else {
            continue;
        };
        let tag_ids = book
            .tags
            .iter()
            .filter_map(|tag| tag.id)
            .collect::<BTreeSet<_>>();
        if tag_ids.is_empty() {
            continue;
        }
        links.entry(book_id).or_default().extend(tag_ids);
    }
    links
}

/// Keeps only links whose book and tag both exist on the target side.
pub fn filter_to_known_tags(
    links: TagLinks,
    known_books: &BTreeSet<Uuid>,
    known_tags: &BTreeSet<Uuid>,
) -> TagLinks {
    links
        .into_iter()
        .filter(|(book_id, _)| known_books.contains(book_id))
        .filter_map(|(book_id, tag_ids)| {
            let kept = tag_ids
                .into_iter()
                .filter(|tag_id| known_tags.contains(tag_id))
                .collect::<BTreeSet<_>>();
            (!kept.is_empty()).then_some((book_id, kept))
        })
        .collect()
}

/// Join-table rows in (book, tag) order.
pub fn association_rows(links: &TagLinks) -> Vec<BookTagRow> {
    links
        .iter()
        .flat_map(|(book_id, tag_ids)| {
            tag_ids
                .iter()
                .map(move |tag_id| BookTagRow::new(*book_id, *tag_id))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::LegacyTagRef;

    fn book(id: Option<Uuid>, tags: &[Option<Uuid>]) -> LegacyBookRecord {
        LegacyBookRecord {
            id,
            tags: tags.iter().map(|id| LegacyTagRef { id: *id }).collect(),
            ..LegacyBookRecord::default()
        }
    }

    #[test]
    fn skips_null_ids_and_empty_books() {
        let (b1, b2, b3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let (t1, t2) = (Uuid::new_v4(), Uuid::new_v4());
        let books = vec![
            book(Some(b1), &[Some(t1), None, Some(t2)]),
            book(Some(b2), &[None]),
            book(Some(b3), &[]),
            book(None, &[Some(t1)]),
        ];

        let links = extract_associations(&books);
        assert_eq!(links.len(), 1);
        assert_eq!(links[&b1], BTreeSet::from([t1, t2]));
    }

    #[test]
    fn duplicate_references_collapse_and_order_is_irrelevant() {
        let b1 = Uuid::new_v4();
        let (t1, t2) = (Uuid::new_v4(), Uuid::new_v4());
        let forward = vec![book(Some(b1), &[Some(t1), Some(t2), Some(t1)])];
        let backward = vec![book(Some(b1), &[Some(t2), Some(t1)])];

        assert_eq!(extract_associations(&forward), extract_associations(&backward));
        assert_eq!(association_rows(&extract_associations(&forward)).len(), 2);
    }

    #[test]
    fn filtering_drops_unknown_tags_and_emptied_books() {
        let (b1, b2, b3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let (t1, t2) = (Uuid::new_v4(), Uuid::new_v4());
        let links = extract_associations(&[
            book(Some(b1), &[Some(t1), Some(t2)]),
            book(Some(b2), &[Some(t2)]),
            book(Some(b3), &[Some(t1)]),
        ]);

        let known_books = BTreeSet::from([b1, b2]);
        let known_tags = BTreeSet::from([t1]);
        let filtered = filter_to_known_tags(links, &known_books, &known_tags);

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[&b1], BTreeSet::from([t1]));

        let rows = association_rows(&filtered);
        assert_eq!(rows.len(), 1);
        assert_eq!((rows[0].book_id, rows[0].tag_id), (b1, t1));
    }
}
