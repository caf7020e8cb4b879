use crate::helper::admin_helpers::{get_conn, HelperError};
use crate::models::db_operations::{posts_db_operations, reports_db_operations};
use crate::models::{BlogPost, Report};
use crate::DbPool;

/// Number of posts previewed on the home page.
pub const HOME_LATEST_POSTS: u32 = 3;

/// A category filter as it arrives from the query string.
/// Missing, blank or "all" means no filtering.
pub fn category_filter(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim)
        .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all"))
}

/// Distinct non-empty categories, in order of first appearance.
pub fn distinct_categories<'a, I>(categories: I) -> Vec<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut seen: Vec<String> = Vec::new();
    for category in categories.into_iter().flatten() {
        let category = category.trim();
        if !category.is_empty() && !seen.iter().any(|c| c == category) {
            seen.push(category.to_string());
        }
    }
    seen
}

fn matches_category(item: Option<&str>, filter: Option<&str>) -> bool {
    match filter {
        None => true,
        Some(wanted) => item.map(str::trim) == Some(wanted),
    }
}

/// A filtered listing plus the categories available across the whole listing.
#[derive(Debug, serde::Serialize)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub categories: Vec<String>,
    pub selected_category: Option<String>,
}

pub fn fetch_latest_posts(pool: &DbPool, limit: u32) -> Result<Vec<BlogPost>, HelperError> {
    let conn = get_conn(pool)?;
    Ok(posts_db_operations::read_published_posts(&conn, Some(limit))?)
}

pub fn fetch_post_listing(pool: &DbPool, category: Option<&str>) -> Result<Listing<BlogPost>, HelperError> {
    let conn = get_conn(pool)?;
    let posts = posts_db_operations::read_published_posts(&conn, None)?;
    let filter = category_filter(category);
    let categories = distinct_categories(posts.iter().map(|p| p.category.as_deref()));
    let items = posts
        .into_iter()
        .filter(|p| matches_category(p.category.as_deref(), filter))
        .collect();
    Ok(Listing { items, categories, selected_category: filter.map(str::to_string) })
}

pub fn fetch_post_categories(pool: &DbPool) -> Result<Vec<String>, HelperError> {
    Ok(fetch_post_listing(pool, None)?.categories)
}

/// `Ok(None)` is the not-found state: no published post carries this slug.
pub fn fetch_published_post(pool: &DbPool, slug: &str) -> Result<Option<BlogPost>, HelperError> {
    let conn = get_conn(pool)?;
    Ok(posts_db_operations::read_published_post_by_slug(&conn, slug)?)
}

pub fn fetch_report_listing(pool: &DbPool, category: Option<&str>) -> Result<Listing<Report>, HelperError> {
    let conn = get_conn(pool)?;
    let reports = reports_db_operations::read_published_reports(&conn)?;
    let filter = category_filter(category);
    let categories = distinct_categories(reports.iter().map(|r| r.category.as_deref()));
    let items = reports
        .into_iter()
        .filter(|r| matches_category(r.category.as_deref(), filter))
        .collect();
    Ok(Listing { items, categories, selected_category: filter.map(str::to_string) })
}

pub fn fetch_published_report(pool: &DbPool, report_id: &str) -> Result<Option<Report>, HelperError> {
    let conn = get_conn(pool)?;
    Ok(reports_db_operations::read_published_report_by_id(&conn, report_id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::admin_helpers::{create_user, save_post, toggle_post, PostInput};

    #[test]
    fn categories_keep_first_appearance_order() {
        let cats = distinct_categories(vec![
            Some("Policy"),
            None,
            Some("Markets"),
            Some(" "),
            Some("Policy"),
            Some("Governance"),
        ]);
        assert_eq!(cats, vec!["Policy", "Markets", "Governance"]);
    }

    #[test]
    fn all_or_blank_means_unfiltered() {
        assert_eq!(category_filter(None), None);
        assert_eq!(category_filter(Some("all")), None);
        assert_eq!(category_filter(Some("  ")), None);
        assert_eq!(category_filter(Some("Policy")), Some("Policy"));
    }

    #[test]
    fn listing_only_shows_published_posts_and_filters_by_category() {
        let pool = crate::test_support::test_pool();
        let admin = create_user(&pool, "admin@example.com", "secret123", None, true).unwrap();
        let publish = |title: &str, category: &str, published: bool| {
            let id = save_post(
                &pool,
                &admin,
                None,
                &PostInput { title, content: "Body", category: Some(category), ..Default::default() },
            )
            .unwrap();
            if published {
                toggle_post(&pool, &id).unwrap();
            }
        };
        publish("Fiscal Outlook", "Policy", true);
        publish("Hidden Draft", "Drafts", false);
        publish("Market Entry", "Markets", true);

        let all = fetch_post_listing(&pool, Some("all")).unwrap();
        assert_eq!(all.items.len(), 2);
        assert!(all.items.iter().all(|p| p.published));
        assert!(!all.categories.contains(&"Drafts".to_string()));

        let policy = fetch_post_listing(&pool, Some("Policy")).unwrap();
        assert_eq!(policy.items.len(), 1);
        assert_eq!(policy.items[0].title, "Fiscal Outlook");
        assert_eq!(policy.categories.len(), 2);

        assert!(fetch_published_post(&pool, "hidden-draft").unwrap().is_none());
        assert!(fetch_published_post(&pool, "market-entry").unwrap().is_some());
    }
}
