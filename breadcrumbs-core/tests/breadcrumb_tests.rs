use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use breadcrumbs_core::{
    CacheOptions, Error, NewPage, PageId, PageRecord, PageStore, Pages, Result, SqlitePageStore,
};

// ----------------------- Test stubs -----------------------

/// Delegates to an in-memory SQLite store and counts record reads into a
/// counter the test keeps a handle to.
struct CountingStore {
    inner: SqlitePageStore,
    gets: Arc<AtomicUsize>,
}

impl CountingStore {
    fn new(gets: Arc<AtomicUsize>) -> Self {
        Self {
            inner: SqlitePageStore::open_in_memory().expect("in-memory store"),
            gets,
        }
    }
}

impl PageStore for CountingStore {
    fn create(&self, page: &NewPage<'_>) -> Result<PageId> {
        self.inner.create(page)
    }
    fn get(&self, id: PageId) -> Result<Option<PageRecord>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(id)
    }
    fn children(&self, id: PageId) -> Result<Vec<PageId>> {
        self.inner.children(id)
    }
    fn roots(&self) -> Result<Vec<PageId>> {
        self.inner.roots()
    }
    fn set_title(&self, id: PageId, title: &str) -> Result<()> {
        self.inner.set_title(id, title)
    }
    fn set_content(&self, id: PageId, content: &str) -> Result<()> {
        self.inner.set_content(id, content)
    }
    fn set_parent(&self, id: PageId, parent: Option<PageId>) -> Result<()> {
        self.inner.set_parent(id, parent)
    }
    fn delete_pages(&self, ids: &[PageId]) -> Result<()> {
        self.inner.delete_pages(ids)
    }
    fn count(&self) -> Result<usize> {
        self.inner.count()
    }
}

fn counted_pages() -> (Pages<CountingStore>, Arc<AtomicUsize>) {
    let gets = Arc::new(AtomicUsize::new(0));
    let pages = Pages::with_store(CountingStore::new(Arc::clone(&gets)), CacheOptions::default());
    (pages, gets)
}

fn pages() -> Pages<CountingStore> {
    counted_pages().0
}

/// Titles along the parent chain, read from stored records only.
fn walked<S: PageStore>(pages: &Pages<S>, id: PageId) -> Vec<String> {
    let mut titles = Vec::new();
    let mut next = pages.record(id).unwrap().parent_id;
    while let Some(p) = next {
        let rec = pages.record(p).unwrap();
        titles.push(rec.title);
        next = rec.parent_id;
    }
    titles.reverse();
    titles
}

// ----------------------- Tests ----------------------------

#[test]
fn root_child_grandchild_scenario() {
    let p = pages();
    let r = p.create(None, "R", "root").expect("create R");
    let c1 = p.create(Some(r), "C1", "child").expect("create C1");
    let g1 = p.create(Some(c1), "G1", "grandchild").expect("create G1");

    assert!(p.breadcrumb(r).unwrap().is_empty());
    assert_eq!(p.breadcrumb(c1).unwrap().titles(), ["R"]);

    let view = p.read(g1).expect("read G1");
    assert_eq!(view.breadcrumb.titles(), ["R", "C1"]);
    assert_eq!(view.parent_id, Some(c1));
    assert!(p.read(c1).unwrap().child_ids.contains(&g1));
}

#[test]
fn child_breadcrumb_is_parent_breadcrumb_plus_parent_title() {
    let p = pages();
    let a = p.create(None, "Docs", "").unwrap();
    let b = p.create(Some(a), "Guides", "").unwrap();
    let c = p.create(Some(b), "Setup", "").unwrap();

    let mut expected = p.breadcrumb(b).unwrap().to_vec();
    expected.push("Guides".to_string());
    assert_eq!(p.breadcrumb(c).unwrap().to_vec(), expected);
}

#[test]
fn create_derives_without_walking_the_chain() {
    let (p, gets) = counted_pages();
    let mut parent = p.create(None, "level-0", "").unwrap();
    for depth in 1..20 {
        parent = p.create(Some(parent), &format!("level-{depth}"), "").unwrap();
    }
    // Warm parent: derivation reads only the parent record, whatever the depth.
    let before = gets.load(Ordering::SeqCst);
    let leaf = p.create(Some(parent), "leaf", "").unwrap();
    assert_eq!(gets.load(Ordering::SeqCst) - before, 1);
    assert_eq!(p.breadcrumb(leaf).unwrap().len(), 20);
}

#[test]
fn second_get_does_not_touch_the_store() {
    let (p, gets) = counted_pages();
    let r = p.create(None, "R", "").unwrap();
    let c = p.create(Some(r), "C", "").unwrap();
    let g = p.create(Some(c), "G", "").unwrap();
    p.cache().clear().unwrap();

    let first = p.breadcrumb(g).unwrap();
    let after_first = gets.load(Ordering::SeqCst);
    assert!(after_first > 0, "cold read must walk the store");

    let second = p.breadcrumb(g).unwrap();
    assert_eq!(first, second);
    assert_eq!(gets.load(Ordering::SeqCst), after_first);
}

#[test]
fn every_breadcrumb_matches_a_walk_of_parent_links() {
    let p = pages();
    let r = p.create(None, "R", "").unwrap();
    let a = p.create(Some(r), "A", "").unwrap();
    let b = p.create(Some(r), "B", "").unwrap();
    let a1 = p.create(Some(a), "A1", "").unwrap();
    let b1 = p.create(Some(b), "B1", "").unwrap();
    let b11 = p.create(Some(b1), "B11", "").unwrap();

    for id in [r, a, b, a1, b1, b11] {
        assert_eq!(p.breadcrumb(id).unwrap().to_vec(), walked(&p, id));
    }
}

#[test]
fn retitling_an_ancestor_shows_up_below_it() {
    let p = pages();
    let r = p.create(None, "R", "").unwrap();
    let a = p.create(Some(r), "A", "").unwrap();
    let leaf = p.create(Some(a), "leaf", "").unwrap();
    assert_eq!(p.breadcrumb(leaf).unwrap().titles(), ["R", "A"]);

    p.rename(r, "Root").unwrap();
    assert_eq!(p.breadcrumb(leaf).unwrap().titles(), ["Root", "A"]);
    assert_eq!(p.breadcrumb(a).unwrap().titles(), ["Root"]);
    // The renamed page's own trail does not include its title.
    assert!(p.breadcrumb(r).unwrap().is_empty());
}

#[test]
fn reparenting_follows_the_new_parent() {
    let p = pages();
    let a = p.create(None, "A", "").unwrap();
    let b = p.create(None, "B", "").unwrap();
    let b1 = p.create(Some(b), "B1", "").unwrap();
    let x = p.create(Some(a), "X", "").unwrap();
    let x1 = p.create(Some(x), "X1", "").unwrap();
    assert_eq!(p.breadcrumb(x1).unwrap().titles(), ["A", "X"]);

    p.move_page(x, Some(b1)).unwrap();

    let mut expected = p.breadcrumb(b1).unwrap().to_vec();
    expected.push("B1".to_string());
    assert_eq!(p.breadcrumb(x).unwrap().to_vec(), expected);
    assert_eq!(p.breadcrumb(x1).unwrap().titles(), ["B", "B1", "X"]);
    assert!(!p.read(a).unwrap().child_ids.contains(&x));

    p.move_page(x, None).unwrap();
    assert!(p.breadcrumb(x).unwrap().is_empty());
    assert_eq!(p.breadcrumb(x1).unwrap().titles(), ["X"]);
}

#[test]
fn moving_under_own_subtree_is_a_cycle() {
    let p = pages();
    let a = p.create(None, "A", "").unwrap();
    let b = p.create(Some(a), "B", "").unwrap();
    let c = p.create(Some(b), "C", "").unwrap();
    let before = p.breadcrumb(c).unwrap();

    assert!(matches!(p.move_page(a, Some(c)), Err(Error::Cycle { .. })));
    assert!(matches!(p.move_page(b, Some(b)), Err(Error::Cycle { .. })));
    assert_eq!(p.read(a).unwrap().parent_id, None);
    assert_eq!(p.breadcrumb(c).unwrap(), before);
}

#[test]
fn unknown_ids_are_not_found() {
    let p = pages();
    let ghost = PageId::new(404);
    assert!(p.breadcrumb(ghost).unwrap_err().is_not_found());
    assert!(p.read(ghost).unwrap_err().is_not_found());
    assert!(p.create(Some(ghost), "orphan", "").unwrap_err().is_not_found());
    assert!(p.rename(ghost, "x").unwrap_err().is_not_found());
    assert!(p.move_page(ghost, None).unwrap_err().is_not_found());
    assert!(p.delete(ghost, true).unwrap_err().is_not_found());

    let r = p.create(None, "R", "").unwrap();
    assert!(p.move_page(r, Some(ghost)).unwrap_err().is_not_found());
    assert_eq!(p.page_count().unwrap(), 1);
}

#[test]
fn delete_refuses_parents_unless_recursive() {
    let p = pages();
    let r = p.create(None, "R", "").unwrap();
    let a = p.create(Some(r), "A", "").unwrap();
    let a1 = p.create(Some(a), "A1", "").unwrap();
    let b = p.create(Some(r), "B", "").unwrap();

    assert!(matches!(p.delete(a, false), Err(Error::HasChildren(id)) if id == a));

    let removed = p.delete(a, true).unwrap();
    assert_eq!(removed, vec![a1, a]);
    for id in [a, a1] {
        assert!(p.read(id).unwrap_err().is_not_found());
        assert!(!p.cache().contains(id).unwrap());
    }
    assert_eq!(p.read(r).unwrap().child_ids, vec![b]);

    assert_eq!(p.delete(b, false).unwrap(), vec![b]);
}

#[test]
fn rebuild_reproduces_walked_breadcrumbs() {
    let p = pages();
    let r = p.create(None, "R", "").unwrap();
    let a = p.create(Some(r), "A", "").unwrap();
    let a1 = p.create(Some(a), "A1", "").unwrap();
    let s = p.create(None, "S", "").unwrap();
    p.rename(a, "A*").unwrap();

    assert_eq!(p.rebuild().unwrap(), 4);
    assert_eq!(p.cache().len().unwrap(), 4);
    for id in [r, a, a1, s] {
        assert_eq!(p.breadcrumb(id).unwrap().to_vec(), walked(&p, id));
    }
}

#[test]
fn check_heals_planted_stale_entries() {
    let p = pages();
    let r = p.create(None, "R", "").unwrap();
    let a = p.create(Some(r), "A", "").unwrap();
    let a1 = p.create(Some(a), "A1", "").unwrap();

    p.cache()
        .insert(a1, vec!["stale".to_string()].into())
        .unwrap();
    let report = p.check().unwrap();
    assert_eq!(report.checked, 3);
    assert_eq!(report.healed, vec![a1]);
    assert_eq!(p.breadcrumb(a1).unwrap().titles(), ["R", "A"]);

    assert!(p.check().unwrap().healed.is_empty());
}

#[test]
fn cache_stats_track_hits_and_misses() {
    let p = pages();
    let r = p.create(None, "R", "").unwrap();
    let c = p.create(Some(r), "C", "").unwrap();

    p.breadcrumb(c).unwrap();
    p.breadcrumb(c).unwrap();
    p.rename(r, "R2").unwrap();
    p.breadcrumb(c).unwrap();

    let stats = p.cache_stats().unwrap();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.entries, 2);
}
