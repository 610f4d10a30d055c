use labpanel_core::db::open_db_in_memory;
use labpanel_core::{
    Panel, PanelConfig, PanelLookupCache, PanelRepository, RepoError, SqlitePanelRepository,
};
use rusqlite::Connection;
use std::sync::Arc;

fn repo_with_page_size(conn: &Connection, page_size: u32) -> SqlitePanelRepository<'_> {
    SqlitePanelRepository::try_new(
        conn,
        Arc::new(PanelLookupCache::new()),
        &PanelConfig {
            default_page_size: page_size,
        },
    )
    .unwrap()
}

fn seed(
    repo: &SqlitePanelRepository<'_>,
    name: &str,
    sort_order: i64,
    is_active: bool,
) -> Panel {
    let mut panel = Panel::new(name, format!("{name} description"), "1");
    panel.sort_order = sort_order;
    panel.is_active = is_active;
    repo.insert_panel(&mut panel).unwrap();
    panel
}

fn names(panels: &[Panel]) -> Vec<&str> {
    panels.iter().map(|panel| panel.panel_name.as_str()).collect()
}

#[test]
fn active_list_orders_by_name_and_all_list_by_sort_order() {
    let conn = open_db_in_memory().unwrap();
    let repo = repo_with_page_size(&conn, 20);
    seed(&repo, "Coagulation", 1, true);
    seed(&repo, "Archived", 2, false);
    seed(&repo, "Bilirubin", 3, true);

    let active = repo.list_active_panels().unwrap();
    assert_eq!(names(&active), vec!["Bilirubin", "Coagulation"]);

    let all = repo.list_all_panels().unwrap();
    assert_eq!(names(&all), vec!["Coagulation", "Archived", "Bilirubin"]);
    assert!(!all[1].is_active);
}

#[test]
fn page_returns_page_size_plus_one_rows() {
    let conn = open_db_in_memory().unwrap();
    let repo = repo_with_page_size(&conn, 2);
    seed(&repo, "C", 0, true);
    seed(&repo, "A", 0, true);
    seed(&repo, "B", 0, true);

    let first = repo.list_page(1).unwrap();
    assert_eq!(names(&first), vec!["A", "B", "C"]);

    let from_second = repo.list_page(2).unwrap();
    assert_eq!(names(&from_second), vec!["B", "C"]);

    let past_end = repo.list_page(10).unwrap();
    assert!(past_end.is_empty());

    let zero = repo.list_page(0).unwrap();
    assert_eq!(names(&zero), vec!["A", "B", "C"]);
}

#[test]
fn page_includes_inactive_panels() {
    let conn = open_db_in_memory().unwrap();
    let repo = repo_with_page_size(&conn, 5);
    seed(&repo, "Active", 0, true);
    seed(&repo, "Retired", 0, false);

    assert_eq!(names(&repo.list_page(1).unwrap()), vec!["Active", "Retired"]);
}

#[test]
fn search_is_case_insensitive_prefix_over_active_panels() {
    let conn = open_db_in_memory().unwrap();
    let repo = repo_with_page_size(&conn, 20);
    seed(&repo, "Hemolysis", 0, true);
    seed(&repo, "hemoglobin", 0, true);
    seed(&repo, "Anemia", 0, true);
    seed(&repo, "Hematocrit (retired)", 0, false);

    let hits = repo.search_active_panels("hem").unwrap();
    assert_eq!(names(&hits), vec!["hemoglobin", "Hemolysis"]);

    let upper = repo.search_active_panels("HEMO").unwrap();
    assert_eq!(upper.len(), 2);

    assert!(repo.search_active_panels("emia").unwrap().is_empty());
}

#[test]
fn search_folds_non_ascii_case() {
    let conn = open_db_in_memory().unwrap();
    let repo = repo_with_page_size(&conn, 20);
    seed(&repo, "électrophorèse", 0, true);
    seed(&repo, "Électrolytes", 0, true);
    seed(&repo, "Elastase", 0, true);
    seed(&repo, "ÉLECTROMYOGRAM (retired)", 0, false);

    let hits = repo.search_active_panels("élec").unwrap();
    assert_eq!(names(&hits), vec!["Électrolytes", "électrophorèse"]);

    let upper = repo.search_active_panels("ÉLECTRO").unwrap();
    assert_eq!(names(&upper), vec!["Électrolytes", "électrophorèse"]);

    assert_eq!(
        names(&repo.search_active_panels("el").unwrap()),
        vec!["Elastase"]
    );
}

#[test]
fn search_treats_wildcards_literally() {
    let conn = open_db_in_memory().unwrap();
    let repo = repo_with_page_size(&conn, 20);
    seed(&repo, "100% Hemolysis", 0, true);
    seed(&repo, "1000 Units", 0, true);
    seed(&repo, "A_B", 0, true);
    seed(&repo, "AXB", 0, true);

    assert_eq!(
        names(&repo.search_active_panels("100%").unwrap()),
        vec!["100% Hemolysis"]
    );
    assert_eq!(names(&repo.search_active_panels("A_").unwrap()), vec!["A_B"]);
    assert_eq!(repo.search_active_panels("").unwrap().len(), 4);
}

#[test]
fn neighbors_follow_name_order() {
    let conn = open_db_in_memory().unwrap();
    let repo = repo_with_page_size(&conn, 20);
    let delta = seed(&repo, "Delta", 0, true);
    seed(&repo, "Alpha", 0, true);
    seed(&repo, "Echo", 0, true);
    seed(&repo, "Charlie", 0, true);
    seed(&repo, "Bravo", 0, true);
    seed(&repo, "Foxtrot", 0, true);

    let id = delta.id.unwrap();
    assert_eq!(names(&repo.next_panels(id).unwrap()), vec!["Echo", "Foxtrot"]);
    assert_eq!(
        names(&repo.previous_panels(id).unwrap()),
        vec!["Charlie", "Bravo"]
    );
}

#[test]
fn neighbors_at_edges_and_for_unknown_id() {
    let conn = open_db_in_memory().unwrap();
    let repo = repo_with_page_size(&conn, 20);
    let alpha = seed(&repo, "Alpha", 0, true);
    let bravo = seed(&repo, "Bravo", 0, true);

    assert!(repo.previous_panels(alpha.id.unwrap()).unwrap().is_empty());
    assert!(repo.next_panels(bravo.id.unwrap()).unwrap().is_empty());
    assert_eq!(
        names(&repo.next_panels(alpha.id.unwrap()).unwrap()),
        vec!["Bravo"]
    );

    let err = repo.next_panels(777).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(777)));
}

#[test]
fn total_count_includes_inactive_panels() {
    let conn = open_db_in_memory().unwrap();
    let repo = repo_with_page_size(&conn, 20);
    assert_eq!(repo.total_panel_count().unwrap(), 0);

    seed(&repo, "Active", 0, true);
    seed(&repo, "Retired", 0, false);
    assert_eq!(repo.total_panel_count().unwrap(), 2);
}
