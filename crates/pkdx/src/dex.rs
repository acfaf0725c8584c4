//! 📚 The Dex: the whole backing store, loaded into memory, one CSV at a time.
//!
//! 🎬 *[a professor hands you an empty device. "Fill it," he says. He does not say how.]*
//!
//! 🧠 Knowledge graph:
//! - `Dex::new` builds an unloaded dex. Reads on it say `DataNotInitialized`.
//! - `Dex::load` scans the store with the same `FileSource` the pipeline uses, so the
//!   header/malformed-row rules are identical. Malformed rows are skipped, duplicates too.
//! - Reads on a loaded-but-empty dex say `EmptyData`. Writes are fine on an empty dex,
//!   otherwise there'd be no way to fill one.
//! - `IdSequence` is the only state that outlives a request. Atomic, so two concurrent
//!   catches never get the same id.
//! - Every write goes to disk first, memory second. If the append fails, memory is untouched.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::app_config::AppConfig;
use crate::backends::{FileAppender, FileSource, Source};
use crate::common::{Pokemon, PokemonDraft};
use crate::errors::{DexError, DexResult};

/// 🔢 Hands out pokemon ids. Starts right after the last id that was loaded.
#[derive(Debug, Default)]
pub struct IdSequence(AtomicU64);

impl IdSequence {
    pub fn starting_at(first: u64) -> Self {
        Self(AtomicU64::new(first))
    }

    /// ➡️ Claim the next id. Never returns the same value twice, and `None` once the
    /// sequence has run out of `u64`s instead of wrapping back to 0.
    pub fn next(&self) -> Option<u64> {
        self.0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| id.checked_add(1))
            .ok()
    }

    /// ⏩ Make sure the sequence never hands out `id` or anything below it again.
    pub fn advance_past(&self, id: u64) {
        self.0.fetch_max(id.saturating_add(1), Ordering::Relaxed);
    }

    // 🔁 Only `load` gets to rewind the sequence.
    fn reset_to(&self, next: u64) {
        self.0.store(next, Ordering::Relaxed);
    }

    pub fn peek(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

// 📦 The in-memory copy: load order plus an index into it.
#[derive(Debug, Default)]
struct Catalog {
    pokemons: Vec<Pokemon>,
    by_id: HashMap<u64, usize>,
}

impl Catalog {
    fn insert(&mut self, pokemon: Pokemon) {
        self.by_id.insert(pokemon.id, self.pokemons.len());
        self.pokemons.push(pokemon);
    }

    fn contains(&self, id: u64) -> bool {
        self.by_id.contains_key(&id)
    }
}

/// 📚 The store. Cheap to share behind an `Arc`, every method takes `&self`.
#[derive(Debug)]
pub struct Dex {
    app_config: AppConfig,
    appender: FileAppender,
    catalog: RwLock<Option<Catalog>>,
    ids: IdSequence,
}

impl Dex {
    /// 📭 An unloaded dex. Call `load` before reading from it.
    pub fn new(app_config: AppConfig) -> Self {
        let appender = FileAppender::new(&app_config.store.file_name);
        Self {
            app_config,
            appender,
            catalog: RwLock::new(None),
            ids: IdSequence::starting_at(1),
        }
    }

    /// 🚀 `new` + `load` in one go.
    pub async fn open(app_config: AppConfig) -> Result<Self> {
        let dex = Self::new(app_config);
        dex.load().await?;
        Ok(dex)
    }

    /// 📥 (Re)read the whole store. Returns how many pokemon made it in.
    pub async fn load(&self) -> Result<usize> {
        // -- 🔒 held for the whole scan. disk, catalog and sequence move together or not at all.
        let mut guard = self.catalog.write().await;
        let path = &self.app_config.store.file_name;
        let mut source = FileSource::open(path, self.app_config.runtime.show_progress)
            .await
            .with_context(|| format!("💀 could not load the dex from '{}'", path.display()))?;

        let mut catalog = Catalog::default();
        let mut last_id = None;
        while let Some(raw) = source
            .next_record()
            .await
            .with_context(|| format!("💀 the dex stopped loading halfway through '{}'", path.display()))?
        {
            let pokemon = match Pokemon::try_from(&raw) {
                Ok(pokemon) => pokemon,
                Err(err) => {
                    warn!("🐛 skipping a row while loading the dex: {err}");
                    continue;
                }
            };
            if catalog.contains(pokemon.id) {
                warn!("🐛 line {}: id {} is already in the dex, keeping the first one", raw.line, pokemon.id);
                continue;
            }
            last_id = Some(pokemon.id);
            catalog.insert(pokemon);
        }

        let count = catalog.pokemons.len();
        // -- 🔢 "next after last" means the last row in the file, not the biggest id
        self.ids.reset_to(last_id.map_or(1, |id: u64| id.saturating_add(1)));
        *guard = Some(catalog);
        drop(guard);
        info!(
            "📚 loaded {count} pokemon from '{}' ({} malformed rows skipped, next id {})",
            path.display(),
            source.rows_skipped(),
            self.ids.peek()
        );
        Ok(count)
    }

    /// 📜 Everything, in store order.
    pub async fn all(&self) -> DexResult<Vec<Pokemon>> {
        let guard = self.catalog.read().await;
        let catalog = readable(guard.as_ref())?;
        Ok(catalog.pokemons.clone())
    }

    /// 🔍 One pokemon by id.
    pub async fn get(&self, id: u64) -> DexResult<Pokemon> {
        let guard = self.catalog.read().await;
        let catalog = readable(guard.as_ref())?;
        catalog
            .by_id
            .get(&id)
            .map(|&at| catalog.pokemons[at].clone())
            .ok_or(DexError::NotFound(id))
    }

    /// ➕ Add a pokemon that already has an id. Taken ids are refused.
    pub async fn create(&self, pokemon: Pokemon) -> DexResult<Pokemon> {
        let mut guard = self.catalog.write().await;
        let catalog = guard.as_mut().ok_or(DexError::DataNotInitialized)?;
        if catalog.contains(pokemon.id) {
            return Err(DexError::AlreadyExists(pokemon.id));
        }

        self.appender.append_row(&pokemon.to_row()).await?;
        self.ids.advance_past(pokemon.id);
        debug!("➕ created pokemon {} ({})", pokemon.id, pokemon.name);
        catalog.insert(pokemon.clone());
        Ok(pokemon)
    }

    /// 🎣 Add a pokemon without an id. It gets the next one from the sequence.
    pub async fn catch(&self, draft: PokemonDraft) -> DexResult<Pokemon> {
        let mut guard = self.catalog.write().await;
        let catalog = guard.as_mut().ok_or(DexError::DataNotInitialized)?;

        let mut id = self.ids.next().ok_or(DexError::IdsExhausted)?;
        while catalog.contains(id) {
            // -- someone `create`d this id by hand earlier. skip it.
            id = self.ids.next().ok_or(DexError::IdsExhausted)?;
        }
        let pokemon = draft.with_id(id);

        self.appender.append_row(&pokemon.to_row()).await?;
        info!("🎣 caught {} as id {}", pokemon.name, pokemon.id);
        catalog.insert(pokemon.clone());
        Ok(pokemon)
    }

    pub async fn len(&self) -> usize {
        self.catalog
            .read()
            .await
            .as_ref()
            .map_or(0, |catalog| catalog.pokemons.len())
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn readable(catalog: Option<&Catalog>) -> DexResult<&Catalog> {
    match catalog {
        None => Err(DexError::DataNotInitialized),
        Some(catalog) if catalog.pokemons.is_empty() => Err(DexError::EmptyData),
        Some(catalog) => Ok(catalog),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Write;
    use std::sync::Arc;

    fn store_with(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut store = tempfile::NamedTempFile::new().expect("💀 temp store");
        for line in lines {
            writeln!(store, "{line}").expect("write");
        }
        store
    }

    fn draft(name: &str) -> PokemonDraft {
        PokemonDraft {
            number: 25,
            name: name.into(),
            image_url: "img".into(),
            abilities: vec!["static".into(), "lightning-rod".into()],
        }
    }

    const STARTERS: &[&str] = &[
        "id,number,name,image_url,abilities",
        "1,1,bulbasaur,img,\"overgrow,chlorophyll\"",
        "X,2,missingno,img,glitch",
        "4,4,charmander,img,blaze",
        "7,7,squirtle,img,torrent",
    ];

    #[tokio::test]
    async fn the_one_where_the_dex_loads_in_store_order() {
        let store = store_with(STARTERS);
        let dex = Dex::open(AppConfig::for_store(store.path())).await.expect("loads");

        let names: Vec<String> = dex.all().await.expect("all").into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["bulbasaur", "charmander", "squirtle"]);
        assert_eq!(dex.len().await, 3);
        assert_eq!(
            dex.get(1).await.expect("found").abilities,
            vec!["overgrow", "chlorophyll"]
        );
        assert!(matches!(dex.get(2).await, Err(DexError::NotFound(2))));
    }

    #[tokio::test]
    async fn the_one_where_nobody_plugged_the_dex_in() {
        let store = store_with(STARTERS);
        let dex = Dex::new(AppConfig::for_store(store.path()));
        assert!(matches!(dex.all().await, Err(DexError::DataNotInitialized)));
        assert!(matches!(dex.get(1).await, Err(DexError::DataNotInitialized)));
        assert!(matches!(dex.catch(draft("pikachu")).await, Err(DexError::DataNotInitialized)));
        assert!(dex.is_empty().await);
    }

    #[tokio::test]
    async fn the_one_where_an_empty_store_can_still_be_filled() {
        let store = store_with(&["id,number,name,image_url,abilities"]);
        let dex = Dex::open(AppConfig::for_store(store.path())).await.expect("loads");
        assert!(matches!(dex.all().await, Err(DexError::EmptyData)));

        let caught = dex.catch(draft("pikachu")).await.expect("catch");
        assert_eq!(caught.id, 1);
        assert_eq!(dex.all().await.expect("all").len(), 1);
    }

    #[tokio::test]
    async fn the_one_where_catch_takes_the_id_after_the_last_row() {
        let store = store_with(STARTERS);
        let dex = Dex::open(AppConfig::for_store(store.path())).await.expect("loads");

        let caught = dex.catch(draft("pikachu")).await.expect("catch");
        assert_eq!(caught.id, 8);

        // -- the row is on disk, not just in memory
        let reloaded = Dex::open(AppConfig::for_store(store.path())).await.expect("reloads");
        let pikachu = reloaded.get(8).await.expect("persisted");
        assert_eq!(pikachu.name, "pikachu");
        assert_eq!(pikachu.abilities, vec!["static", "lightning-rod"]);
    }

    #[tokio::test]
    async fn the_one_where_ids_are_not_for_sharing() {
        let store = store_with(STARTERS);
        let dex = Dex::open(AppConfig::for_store(store.path())).await.expect("loads");

        let taken = dex.get(4).await.expect("charmander");
        assert!(matches!(dex.create(taken).await, Err(DexError::AlreadyExists(4))));

        let mut mew = draft("mew").with_id(151);
        mew.number = 151;
        dex.create(mew).await.expect("fresh id");
        // -- the sequence moves past hand-picked ids
        assert_eq!(dex.catch(draft("mewtwo")).await.expect("catch").id, 152);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn the_one_where_concurrent_catches_never_collide() {
        let store = store_with(STARTERS);
        let dex = Arc::new(Dex::open(AppConfig::for_store(store.path())).await.expect("loads"));

        let mut handles = Vec::new();
        for n in 0..16 {
            let dex = Arc::clone(&dex);
            handles.push(tokio::spawn(async move {
                dex.catch(draft(&format!("ditto-{n}"))).await.expect("catch").id
            }));
        }
        let mut ids = HashSet::new();
        for handle in handles {
            assert!(ids.insert(handle.await.expect("task")));
        }
        assert_eq!(ids.len(), 16);
        assert_eq!(dex.len().await, 19);
    }

    #[test]
    fn the_one_where_the_sequence_counts_up_from_its_seed() {
        let ids = IdSequence::starting_at(10);
        assert_eq!(ids.next(), Some(10));
        assert_eq!(ids.next(), Some(11));
        ids.advance_past(5);
        assert_eq!(ids.peek(), 12);
        ids.advance_past(40);
        assert_eq!(ids.next(), Some(41));
    }

    #[tokio::test]
    async fn the_one_where_a_missing_store_is_an_io_error() {
        let dir = tempfile::tempdir().expect("💀 temp dir");
        let err = Dex::open(AppConfig::for_store(dir.path().join("nope.csv")))
            .await
            .expect_err("nothing to load");
        assert!(matches!(err.downcast_ref::<DexError>(), Some(DexError::Io { .. })));
    }

    #[test]
    fn the_one_where_the_sequence_runs_out_instead_of_wrapping() {
        let ids = IdSequence::starting_at(u64::MAX - 1);
        assert_eq!(ids.next(), Some(u64::MAX - 1));
        assert_eq!(ids.next(), None);
        assert_eq!(ids.next(), None);
        assert_eq!(ids.peek(), u64::MAX);
    }

    #[tokio::test]
    async fn the_one_where_the_last_row_holds_the_biggest_id_there_is() {
        let max_row = format!("{},1,arceus,img,multitype", u64::MAX);
        let store = store_with(&["id,number,name,image_url,abilities", &max_row]);
        let dex = Dex::open(AppConfig::for_store(store.path())).await.expect("loads without overflowing");

        assert_eq!(dex.get(u64::MAX).await.expect("found").name, "arceus");
        assert!(matches!(dex.catch(draft("pikachu")).await, Err(DexError::IdsExhausted)));
        assert_eq!(dex.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn the_one_where_catching_during_a_reload_stays_consistent() {
        let store = store_with(STARTERS);
        let dex = Arc::new(Dex::open(AppConfig::for_store(store.path())).await.expect("loads"));

        let mut handles = Vec::new();
        for n in 0..8 {
            let dex = Arc::clone(&dex);
            handles.push(tokio::spawn(async move {
                if n % 2 == 0 {
                    dex.load().await.map(|_| ()).expect("reload");
                } else {
                    dex.catch(draft(&format!("eevee-{n}"))).await.map(|_| ()).expect("catch");
                }
            }));
        }
        for handle in handles {
            handle.await.expect("task");
        }

        // -- whatever the interleaving, memory and disk agree and no id was handed out twice
        dex.load().await.expect("final reload");
        let all = dex.all().await.expect("all");
        let unique: HashSet<u64> = all.iter().map(|p| p.id).collect();
        assert_eq!(unique.len(), all.len());
        assert_eq!(all.len(), 7);
        assert_eq!(dex.catch(draft("vaporeon")).await.expect("catch").id, all[all.len() - 1].id + 1);
    }
}
