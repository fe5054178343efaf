//! Turning a user-supplied token into the numeric ID an endpoint needs.
//!
//! A token that parses as an integer is always taken as a literal ID, even if some
//! entity happens to be named "42". Anything else is searched for by name, page by
//! page, in the entity's listing:
//!
//! - names and tokens are compared case-folded, with no other normalisation;
//! - an exact match returns immediately, first seen wins;
//! - otherwise the first partial match seen is kept and returned once the scan ends;
//! - a page shorter than the page size ends the listing.

use std::fmt;

use tracing::debug;

use crate::error::{HtbError, Result};
use crate::models::EntitySummary;
use crate::traits::PageSource;

/// Page size used for name searches.
pub const PAGE_SIZE: u32 = 20;
/// Pages scanned before giving up on a name.
pub const DEFAULT_MAX_PAGES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Machine,
    Challenge,
    Sherlock,
    Category,
    Prolab,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Machine => "machine",
            EntityKind::Challenge => "challenge",
            EntityKind::Sherlock => "sherlock",
            EntityKind::Category => "category",
            EntityKind::Prolab => "prolab",
        };
        f.write_str(s)
    }
}

/// What the user typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Id(u64),
    Name(String),
}

impl Identifier {
    /// Surrounding whitespace is dropped for both forms.
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        match token.parse::<u64>() {
            Ok(id) => Identifier::Id(id),
            Err(_) => Identifier::Name(token.to_string()),
        }
    }
}

/// A resolved ID, tagged with what it identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRef {
    pub id: u64,
    pub kind: EntityKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    Exact,
    Partial,
    None,
}

/// How a non-exact match is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    /// The token appears anywhere in the name.
    Substring,
    /// The token's words line up with whole words of the name, where words are
    /// separated by whitespace, `-` or `_`. Keeps "pwn" from matching "GamePwn".
    WordSegment,
}

impl MatchRule {
    pub fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Category => MatchRule::WordSegment,
            _ => MatchRule::Substring,
        }
    }
}

/// Compare `name` against `token` under `rule`.
pub fn classify(name: &str, token: &str, rule: MatchRule) -> Match {
    let name = name.to_lowercase();
    let token = token.to_lowercase();
    if token.is_empty() {
        return Match::None;
    }
    if name == token {
        return Match::Exact;
    }
    let partial = match rule {
        MatchRule::Substring => name.contains(&token),
        MatchRule::WordSegment => {
            let name_words = words(&name);
            let token_words = words(&token);
            !token_words.is_empty()
                && name_words
                    .windows(token_words.len())
                    .any(|window| window == token_words.as_slice())
        }
    };
    if partial { Match::Partial } else { Match::None }
}

fn words(s: &str) -> Vec<&str> {
    s.split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|w| !w.is_empty())
        .collect()
}

/// Scan one batch of entries, returning the first exact match and recording the
/// first partial match in `candidate` if none is recorded yet.
fn scan_batch(
    items: &[EntitySummary],
    token: &str,
    rule: MatchRule,
    candidate: &mut Option<EntitySummary>,
) -> Option<EntitySummary> {
    for item in items {
        match classify(&item.name, token, rule) {
            Match::Exact => return Some(item.clone()),
            Match::Partial if candidate.is_none() => *candidate = Some(item.clone()),
            _ => {}
        }
    }
    None
}

/// A bounded, sequential scan over a paginated listing.
#[derive(Debug, Clone, Copy)]
pub struct PagedScan {
    pub per_page: u32,
    pub max_pages: u32,
    pub rule: MatchRule,
}

impl PagedScan {
    pub fn new(max_pages: u32, rule: MatchRule) -> Self {
        Self {
            per_page: PAGE_SIZE,
            max_pages,
            rule,
        }
    }

    /// Best match for `token` within the page budget, or `None`.
    ///
    /// Fetch failures abort the scan; they are not turned into "not found".
    pub async fn find<S: PageSource>(
        &self,
        source: &S,
        token: &str,
    ) -> Result<Option<EntitySummary>> {
        let mut candidate = None;
        for page in 1..=self.max_pages {
            let batch = source.fetch_page(page, self.per_page).await?;
            debug!(
                kind = %source.kind(),
                page,
                received = batch.received,
                usable = batch.entries.len(),
                token,
                "scanning listing page"
            );

            if let Some(exact) = scan_batch(&batch.entries, token, self.rule, &mut candidate) {
                return Ok(Some(exact));
            }
            if batch.received < self.per_page as usize {
                break;
            }
        }
        Ok(candidate)
    }
}

/// Resolve `token` against a paginated listing, scanning at most `max_pages` pages.
pub async fn resolve<S: PageSource>(token: &str, source: &S, max_pages: u32) -> Result<ResolvedRef> {
    let kind = source.kind();
    let name = match Identifier::parse(token) {
        Identifier::Id(id) => return Ok(ResolvedRef { id, kind }),
        Identifier::Name(name) => name,
    };

    let scan = PagedScan::new(max_pages, MatchRule::for_kind(kind));
    match scan.find(source, &name).await? {
        Some(hit) => {
            debug!(kind = %kind, token = %name, id = hit.id, matched = %hit.name, "resolved name");
            Ok(ResolvedRef { id: hit.id, kind })
        }
        None => Err(HtbError::NotFound { kind, name }),
    }
}

/// Resolve `token` against a listing that arrives in one response (e.g. categories).
pub fn resolve_in(token: &str, kind: EntityKind, items: &[EntitySummary]) -> Result<ResolvedRef> {
    let name = match Identifier::parse(token) {
        Identifier::Id(id) => return Ok(ResolvedRef { id, kind }),
        Identifier::Name(name) => name,
    };

    let mut candidate = None;
    let hit = scan_batch(items, &name, MatchRule::for_kind(kind), &mut candidate).or(candidate);
    match hit {
        Some(hit) => Ok(ResolvedRef { id: hit.id, kind }),
        None => Err(HtbError::NotFound { kind, name }),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::models::Page;

    fn entity(id: u64, name: &str) -> EntitySummary {
        EntitySummary {
            id,
            name: name.to_string(),
        }
    }

    /// `n` filler entries that match nothing reasonable.
    fn filler(start: u64, n: usize) -> Vec<EntitySummary> {
        (0..n as u64)
            .map(|i| entity(start + i, &format!("zzfiller{}", start + i)))
            .collect()
    }

    struct FakeListing {
        kind: EntityKind,
        pages: Vec<Vec<EntitySummary>>,
        requested: RefCell<Vec<u32>>,
    }

    impl FakeListing {
        fn new(kind: EntityKind, pages: Vec<Vec<EntitySummary>>) -> Self {
            Self {
                kind,
                pages,
                requested: RefCell::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.requested.borrow().len()
        }
    }

    impl PageSource for FakeListing {
        fn kind(&self) -> EntityKind {
            self.kind
        }

        async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Page> {
            assert_eq!(per_page, PAGE_SIZE);
            self.requested.borrow_mut().push(page);
            Ok(self
                .pages
                .get(page as usize - 1)
                .cloned()
                .unwrap_or_default()
                .into())
        }
    }

    struct FailingListing;

    impl PageSource for FailingListing {
        fn kind(&self) -> EntityKind {
            EntityKind::Machine
        }

        async fn fetch_page(&self, _page: u32, _per_page: u32) -> Result<Page> {
            Err(HtbError::Request {
                method: "GET".into(),
                url: "http://test/machine/paginated".into(),
                status: Some(502),
                body: "bad gateway".into(),
            })
        }
    }

    #[test]
    fn identifier_parse() {
        assert_eq!(Identifier::parse("42"), Identifier::Id(42));
        assert_eq!(Identifier::parse(" 7 "), Identifier::Id(7));
        assert_eq!(Identifier::parse("Lame"), Identifier::Name("Lame".into()));
        assert_eq!(Identifier::parse("-3"), Identifier::Name("-3".into()));
        assert_eq!(Identifier::parse("  Lame\n"), Identifier::Name("Lame".into()));
    }

    #[tokio::test]
    async fn padded_name_still_matches_exactly() {
        let mut page1 = filler(100, 19);
        page1.insert(0, entity(5, "Lame Duck"));
        let page2 = vec![entity(9, "Lame")];
        let listing = FakeListing::new(EntityKind::Machine, vec![page1, page2]);

        let resolved = resolve(" lame ", &listing, DEFAULT_MAX_PAGES).await.unwrap();
        assert_eq!(resolved.id, 9);

        let err = resolve(" nope ", &listing, 1).await.unwrap_err();
        assert_eq!(err.to_string(), "could not find machine with name 'nope'");
    }

    #[tokio::test]
    async fn numeric_tokens_never_touch_the_network() {
        let listing = FakeListing::new(EntityKind::Machine, vec![vec![entity(1, "42")]]);
        let resolved = resolve("42", &listing, DEFAULT_MAX_PAGES).await.unwrap();
        assert_eq!(
            resolved,
            ResolvedRef {
                id: 42,
                kind: EntityKind::Machine
            }
        );
        assert_eq!(listing.calls(), 0);
    }

    #[tokio::test]
    async fn exact_match_beats_earlier_partial_match() {
        let mut page1 = filler(100, 19);
        page1.insert(0, entity(5, "Lame Duck"));
        let page2 = vec![entity(9, "LAME")];
        let listing = FakeListing::new(EntityKind::Machine, vec![page1, page2]);

        let resolved = resolve("lame", &listing, DEFAULT_MAX_PAGES).await.unwrap();
        assert_eq!(resolved.id, 9);
        assert_eq!(listing.calls(), 2);
    }

    #[tokio::test]
    async fn exact_match_stops_scanning_immediately() {
        let mut page1 = filler(100, 19);
        page1.push(entity(3, "Blue"));
        let listing = FakeListing::new(EntityKind::Machine, vec![page1, filler(200, 20)]);

        let resolved = resolve("blue", &listing, DEFAULT_MAX_PAGES).await.unwrap();
        assert_eq!(resolved.id, 3);
        assert_eq!(*listing.requested.borrow(), vec![1]);
    }

    #[tokio::test]
    async fn first_partial_match_wins_without_an_exact_match() {
        let mut page1 = filler(100, 18);
        page1.push(entity(11, "Blue Print"));
        page1.push(entity(12, "Blueprint"));
        let mut page2 = filler(200, 19);
        page2.push(entity(13, "Deep Blue"));
        let listing = FakeListing::new(EntityKind::Challenge, vec![page1, page2, vec![]]);

        let resolved = resolve("blue", &listing, DEFAULT_MAX_PAGES).await.unwrap();
        assert_eq!(resolved.id, 11);
        assert_eq!(resolved.kind, EntityKind::Challenge);
    }

    #[tokio::test]
    async fn short_page_ends_the_scan() {
        let listing = FakeListing::new(
            EntityKind::Sherlock,
            vec![filler(100, 20), filler(200, 7), filler(300, 20)],
        );

        let err = resolve("nothing", &listing, DEFAULT_MAX_PAGES).await.unwrap_err();
        assert!(matches!(
            err,
            HtbError::NotFound {
                kind: EntityKind::Sherlock,
                ..
            }
        ));
        assert_eq!(*listing.requested.borrow(), vec![1, 2]);
    }

    #[tokio::test]
    async fn not_found_uses_exactly_the_page_budget() {
        let pages = (0..10).map(|p| filler(p * 100, 20)).collect();
        let listing = FakeListing::new(EntityKind::Machine, pages);

        let err = resolve("nothing", &listing, 3).await.unwrap_err();
        assert_eq!(err.to_string(), "could not find machine with name 'nothing'");
        assert_eq!(*listing.requested.borrow(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn matching_is_case_folding_only() {
        let listing = FakeListing::new(
            EntityKind::Machine,
            vec![vec![entity(7, "Interesting Box")]],
        );

        // Hyphen and space are not treated as equivalent
        let err = resolve("interesting-box", &listing, DEFAULT_MAX_PAGES)
            .await
            .unwrap_err();
        assert!(matches!(err, HtbError::NotFound { .. }));

        let resolved = resolve("INTERESTING", &listing, DEFAULT_MAX_PAGES)
            .await
            .unwrap();
        assert_eq!(resolved.id, 7);
    }

    #[tokio::test]
    async fn fetch_errors_propagate_instead_of_not_found() {
        let err = resolve("lame", &FailingListing, DEFAULT_MAX_PAGES)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(502));
    }

    #[test]
    fn category_partial_match_requires_whole_words() {
        let categories = vec![
            entity(1, "GamePwn"),
            entity(2, "Pwn"),
            entity(3, "Reversing"),
            entity(4, "AI - ML"),
            entity(5, "Secure_Coding"),
        ];

        assert_eq!(resolve_in("pwn", EntityKind::Category, &categories).unwrap().id, 2);
        assert_eq!(resolve_in("ml", EntityKind::Category, &categories).unwrap().id, 4);
        assert_eq!(
            resolve_in("coding", EntityKind::Category, &categories).unwrap().id,
            5
        );
        assert!(resolve_in("rev", EntityKind::Category, &categories).is_err());
        assert!(resolve_in("game", EntityKind::Category, &categories).is_err());
        assert_eq!(resolve_in("3", EntityKind::Category, &categories).unwrap().id, 3);
    }

    #[test]
    fn classify_rules() {
        assert_eq!(classify("Lame", "lame", MatchRule::Substring), Match::Exact);
        assert_eq!(classify("GamePwn", "pwn", MatchRule::Substring), Match::Partial);
        assert_eq!(classify("GamePwn", "pwn", MatchRule::WordSegment), Match::None);
        assert_eq!(
            classify("Secure Coding Web", "coding web", MatchRule::WordSegment),
            Match::Partial
        );
        assert_eq!(classify("Lame", "", MatchRule::Substring), Match::None);
    }
}
