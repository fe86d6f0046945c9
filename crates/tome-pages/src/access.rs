//! Pure access-control decisions for pages.
//!
//! Both predicates are decisions over supplied state only: no I/O, no
//! clock, no hidden inputs. Any ambiguity denies — an anonymous viewer can
//! never satisfy the private-page branch, and the owner always can.

use crate::Page;
use tome_types::{EditPolicy, Visibility};

/// Decides whether `viewer` may read `page`.
///
/// Public pages are readable by everyone, including anonymous viewers.
/// Private pages are readable only by the owner and by allow-listed users.
pub fn can_read(page: &Page, allow_list: &[String], viewer: Option<&str>) -> bool {
    if page.visibility == Visibility::Public {
        return true;
    }
    match viewer {
        Some(name) => name == page.owner || allow_list.iter().any(|u| u == name),
        None => false,
    }
}

/// Decides whether `viewer` may edit `page` content.
///
/// The owner may always edit. Under `all_authenticated`, any resolved
/// identity that can read the page may edit it — editing a private page
/// still requires being owner or allow-listed.
pub fn can_edit(page: &Page, allow_list: &[String], viewer: Option<&str>) -> bool {
    match viewer {
        Some(name) if name == page.owner => true,
        Some(_) => {
            page.edit_policy == EditPolicy::AllAuthenticated
                && can_read(page, allow_list, viewer)
        }
        None => false,
    }
}

/// Decides whether `viewer` may change the page's access settings
/// (visibility, edit policy, allow-list). Only the owner may, independent
/// of the edit policy.
pub fn can_manage(page: &Page, viewer: Option<&str>) -> bool {
    matches!(viewer, Some(name) if name == page.owner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(visibility: Visibility, edit_policy: EditPolicy) -> Page {
        Page {
            id: 1,
            slug: "keep".to_string(),
            title: "Keep".to_string(),
            content: String::new(),
            facts: Vec::new(),
            visibility,
            edit_policy,
            owner: "alice".to_string(),
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn public_page_readable_by_everyone() {
        let p = page(Visibility::Public, EditPolicy::OwnerOnly);
        assert!(can_read(&p, &[], None));
        assert!(can_read(&p, &[], Some("alice")));
        assert!(can_read(&p, &[], Some("stranger")));
    }

    #[test]
    fn private_page_readable_by_owner_and_allow_list_only() {
        let p = page(Visibility::Private, EditPolicy::OwnerOnly);
        let allowed = vec!["bob".to_string()];

        assert!(can_read(&p, &allowed, Some("alice")), "owner always reads");
        assert!(can_read(&p, &allowed, Some("bob")), "allow-listed reads");
        assert!(!can_read(&p, &allowed, Some("carol")));
        assert!(!can_read(&p, &allowed, None), "anonymous never reads private");
    }

    #[test]
    fn owner_edits_regardless_of_policy() {
        for policy in [EditPolicy::OwnerOnly, EditPolicy::AllAuthenticated] {
            let p = page(Visibility::Private, policy);
            assert!(can_edit(&p, &[], Some("alice")));
        }
    }

    #[test]
    fn owner_only_policy_blocks_non_owners() {
        let p = page(Visibility::Public, EditPolicy::OwnerOnly);
        assert!(!can_edit(&p, &[], Some("bob")));
        assert!(!can_edit(&p, &[], None));
    }

    #[test]
    fn all_authenticated_requires_identity_and_read_access() {
        let public = page(Visibility::Public, EditPolicy::AllAuthenticated);
        assert!(can_edit(&public, &[], Some("bob")));
        assert!(!can_edit(&public, &[], None), "anonymous never edits");

        let private = page(Visibility::Private, EditPolicy::AllAuthenticated);
        let allowed = vec!["bob".to_string()];
        assert!(
            can_edit(&private, &allowed, Some("bob")),
            "allow-listed user edits under all_authenticated"
        );
        assert!(
            !can_edit(&private, &allowed, Some("carol")),
            "edit of a private page still requires read access"
        );
    }

    #[test]
    fn only_owner_manages_settings() {
        let p = page(Visibility::Public, EditPolicy::AllAuthenticated);
        assert!(can_manage(&p, Some("alice")));
        assert!(!can_manage(&p, Some("bob")));
        assert!(!can_manage(&p, None));
    }
}
