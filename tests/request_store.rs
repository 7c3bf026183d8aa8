use std::sync::{Arc, Barrier};
use std::thread;

use jelly_requester::store::{RequestStore, Status, StoreOptions};

fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn pending(store: &RequestStore) -> Vec<(i64, String)> {
    store
        .list()
        .unwrap()
        .into_iter()
        .map(|p| (p.ordinal, p.identifier))
        .collect()
}

#[test]
fn remove_then_complete_across_restart() {
    init_log();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requests.db");

    let store = RequestStore::open(&path, StoreOptions::default()).unwrap();
    for link in [
        "https://themoviedb.org/movie/603",
        "https://imdb.com/title/tt0133093/",
        "https://open.spotify.com/album/1",
    ] {
        store.add(link).unwrap();
    }
    assert_eq!(
        pending(&store),
        vec![
            (1, "https://imdb.com/title/tt0133093/".to_string()),
            (2, "https://open.spotify.com/album/1".to_string()),
            (3, "https://themoviedb.org/movie/603".to_string()),
        ]
    );

    assert_eq!(store.remove(1).unwrap(), "https://imdb.com/title/tt0133093/");
    assert_eq!(
        store.complete(2).unwrap(),
        "https://themoviedb.org/movie/603"
    );
    store.close();

    let store = RequestStore::open(&path, StoreOptions::default()).unwrap();
    assert_eq!(
        pending(&store),
        vec![(1, "https://open.spotify.com/album/1".to_string())]
    );
    assert_eq!(store.get("https://imdb.com/title/tt0133093/").unwrap(), None);
    assert_eq!(
        store.get("https://themoviedb.org/movie/603").unwrap(),
        Some(Status::Done)
    );
    assert_eq!(
        store.raw("https://themoviedb.org/movie/603").unwrap(),
        Some(vec![0])
    );
    assert_eq!(
        store.raw("https://open.spotify.com/album/1").unwrap(),
        Some(vec![1])
    );
    store.close();
}

#[test]
fn concurrent_writers_never_resolve_the_same_ordinal_twice() {
    init_log();
    let dir = tempfile::tempdir().unwrap();
    let store =
        Arc::new(RequestStore::open(dir.path().join("requests.db"), StoreOptions::default()).unwrap());
    for i in 0..8 {
        store.add(&format!("https://discogs.com/release/{i}")).unwrap();
    }

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                if i % 2 == 0 {
                    store.remove(1)
                } else {
                    store.complete(1)
                }
            })
        })
        .collect();

    let mut resolved: Vec<String> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();
    resolved.sort();
    resolved.dedup();

    assert_eq!(resolved.len(), 8);
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn readers_see_a_stable_snapshot() {
    init_log();
    let dir = tempfile::tempdir().unwrap();
    let store = RequestStore::open(dir.path().join("requests.db"), StoreOptions::default()).unwrap();
    store.add("https://thetvdb.com/series/lost").unwrap();
    store.add("https://musicbrainz.org/release/1").unwrap();

    let first = store.list().unwrap();
    let second = store.list().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
}
