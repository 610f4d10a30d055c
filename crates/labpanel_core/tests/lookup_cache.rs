use labpanel_core::db::{open_db, open_db_in_memory};
use labpanel_core::{
    Panel, PanelConfig, PanelLookupCache, PanelRepository, SqlitePanelRepository,
};
use rusqlite::params;
use std::sync::Arc;
use std::thread;

#[test]
fn lookups_are_served_from_active_panels() {
    let conn = open_db_in_memory().unwrap();
    let cache = Arc::new(PanelLookupCache::new());
    let repo =
        SqlitePanelRepository::try_new(&conn, Arc::clone(&cache), &PanelConfig::default())
            .unwrap();

    let mut active = Panel::new("CBC", "Complete blood count", "1");
    repo.insert_panel(&mut active).unwrap();
    let mut retired = Panel::new("Retired", "No longer ordered", "1");
    retired.is_active = false;
    repo.insert_panel(&mut retired).unwrap();

    assert!(!cache.is_loaded());
    let active_id = active.id.unwrap();
    assert_eq!(repo.id_for_name("CBC").unwrap(), Some(active_id));
    assert!(cache.is_loaded());
    assert_eq!(repo.name_for_id(active_id).unwrap().as_deref(), Some("CBC"));
    assert_eq!(
        repo.description_for_id(active_id).unwrap().as_deref(),
        Some("Complete blood count")
    );

    assert_eq!(repo.name_for_id(retired.id.unwrap()).unwrap(), None);
    assert_eq!(repo.id_for_name("Retired").unwrap(), None);
}

#[test]
fn every_write_invalidates_all_lookup_maps() {
    let conn = open_db_in_memory().unwrap();
    let cache = Arc::new(PanelLookupCache::new());
    let repo =
        SqlitePanelRepository::try_new(&conn, Arc::clone(&cache), &PanelConfig::default())
            .unwrap();

    let mut panel = Panel::new("CBC", "Complete blood count", "1");
    repo.insert_panel(&mut panel).unwrap();
    let id = panel.id.unwrap();
    assert_eq!(repo.id_for_name("CBC").unwrap(), Some(id));

    panel.panel_name = "CBC with differential".to_string();
    panel.description = "Complete blood count + diff".to_string();
    repo.update_panel(&panel).unwrap();
    assert!(!cache.is_loaded());
    assert_eq!(repo.id_for_name("CBC").unwrap(), None);
    assert_eq!(repo.id_for_name("CBC with differential").unwrap(), Some(id));
    assert_eq!(
        repo.description_for_id(id).unwrap().as_deref(),
        Some("Complete blood count + diff")
    );

    repo.delete_panels(&[panel.clone()]).unwrap();
    assert!(!cache.is_loaded());
    assert_eq!(repo.name_for_id(id).unwrap(), None);
    assert_eq!(repo.id_for_name("CBC with differential").unwrap(), None);
}

#[test]
fn out_of_band_changes_stay_stale_until_invalidated() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePanelRepository::try_new(
        &conn,
        Arc::new(PanelLookupCache::new()),
        &PanelConfig::default(),
    )
    .unwrap();

    let mut panel = Panel::new("CBC", "Complete blood count", "1");
    repo.insert_panel(&mut panel).unwrap();
    let id = panel.id.unwrap();
    assert_eq!(repo.name_for_id(id).unwrap().as_deref(), Some("CBC"));

    conn.execute(
        "UPDATE panels SET panel_name = ?1 WHERE id = ?2;",
        params!["Renamed elsewhere", id],
    )
    .unwrap();
    assert_eq!(repo.name_for_id(id).unwrap().as_deref(), Some("CBC"));

    repo.invalidate_caches();
    assert_eq!(
        repo.name_for_id(id).unwrap().as_deref(),
        Some("Renamed elsewhere")
    );
    assert_eq!(repo.id_for_name("Renamed elsewhere").unwrap(), Some(id));
    assert_eq!(repo.id_for_name("CBC").unwrap(), None);
}

#[test]
fn shared_cache_sees_writes_from_other_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("panels.sqlite3");
    let cache = Arc::new(PanelLookupCache::new());

    {
        let conn = open_db(&path).unwrap();
        let repo =
            SqlitePanelRepository::try_new(&conn, Arc::clone(&cache), &PanelConfig::default())
                .unwrap();
        let mut panel = Panel::new("Seed", "Seed panel", "1");
        repo.insert_panel(&mut panel).unwrap();
        assert!(repo.id_for_name("Seed").unwrap().is_some());
    }

    let handles = (0..4)
        .map(|worker| {
            let cache = Arc::clone(&cache);
            let path = path.clone();
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let repo = SqlitePanelRepository::try_new(&conn, cache, &PanelConfig::default())
                    .unwrap();
                let mut panel = Panel::new(
                    format!("Worker {worker}"),
                    format!("Panel from worker {worker}"),
                    "1",
                );
                repo.insert_panel(&mut panel).unwrap();
                assert!(
                    repo.id_for_name("Seed").unwrap().is_some(),
                    "seed panel must stay visible"
                );
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().unwrap();
    }

    let conn = open_db(&path).unwrap();
    let repo = SqlitePanelRepository::try_new(&conn, cache, &PanelConfig::default()).unwrap();
    for worker in 0..4 {
        assert!(repo
            .id_for_name(&format!("Worker {worker}"))
            .unwrap()
            .is_some());
    }
}
