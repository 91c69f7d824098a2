use super::*;
use crate::access::RequiredRole;

fn storefront() -> RouteTable<&'static str> {
    RouteTable::builder()
        .route("/", "home")
        .route("/product/:id", "product")
        .route("/signin", "signin")
        .protected("/orders", "orders", "user")
        .route("*", "not-found")
        .protected("/admin/users", "admin-users", "admin")
        .build()
        .unwrap()
}

// =============================================================================
// resolve
// =============================================================================

#[test]
fn resolve_matches_static_paths() {
    let table = storefront();
    let m = table.resolve("/signin").unwrap();
    assert_eq!(*m.component, "signin");
    assert_eq!(m.requirement, RouteRequirement::None);
    assert!(!m.fallback);
}

#[test]
fn resolve_root() {
    let table = storefront();
    assert_eq!(*table.resolve("/").unwrap().component, "home");
    assert_eq!(*table.resolve("").unwrap().component, "home");
}

#[test]
fn resolve_extracts_params() {
    let table = storefront();
    let m = table.resolve("/product/42").unwrap();
    assert_eq!(*m.component, "product");
    assert_eq!(m.params, vec![("id".to_owned(), "42".to_owned())]);
}

#[test]
fn resolve_ignores_query_fragment_and_trailing_slash() {
    let table = storefront();
    assert_eq!(*table.resolve("/orders/?page=2").unwrap().component, "orders");
    assert_eq!(*table.resolve("/signin#top").unwrap().component, "signin");
}

#[test]
fn resolve_carries_requirements() {
    let table = storefront();
    assert_eq!(table.resolve("/orders").unwrap().requirement, RouteRequirement::Role(RequiredRole::User));
    assert_eq!(table.resolve("/admin/users").unwrap().requirement, RouteRequirement::Role(RequiredRole::Admin));
}

#[test]
fn fallback_applies_only_when_nothing_matches() {
    let table = storefront();
    // Declared after "*", still reachable.
    assert_eq!(*table.resolve("/admin/users").unwrap().component, "admin-users");

    let m = table.resolve("/nowhere/at/all").unwrap();
    assert_eq!(*m.component, "not-found");
    assert!(m.fallback);
    assert_eq!(m.requirement, RouteRequirement::None);
}

#[test]
fn resolve_without_fallback_returns_none() {
    let table = RouteTable::builder().route("/", 1).build().unwrap();
    assert!(table.resolve("/missing").is_none());
}

#[test]
fn first_declared_match_wins() {
    let table = RouteTable::builder().route("/product/new", "create").route("/product/:id", "show").build().unwrap();
    assert_eq!(*table.resolve("/product/new").unwrap().component, "create");
    assert_eq!(*table.resolve("/product/7").unwrap().component, "show");
}

// =============================================================================
// build
// =============================================================================

#[test]
fn build_rejects_unknown_role() {
    let err = RouteTable::builder().protected("/x", (), "superuser").build().unwrap_err();
    assert_eq!(
        err,
        RouteTableError::UnknownRole { path: "/x".into(), source: InvalidRequiredRole("superuser".into()) }
    );
}

#[test]
fn build_rejects_guest_as_required_role() {
    let err = RouteTable::builder().protected("/x", (), "guest").build().unwrap_err();
    assert!(matches!(err, RouteTableError::UnknownRole { .. }));
}

#[test]
fn build_rejects_duplicate_paths() {
    let err = RouteTable::builder().route("/a/:x", ()).route("/a/:y", ()).build().unwrap_err();
    assert_eq!(err, RouteTableError::DuplicatePath("/a/:y".into()));
}

#[test]
fn build_rejects_relative_and_malformed_paths() {
    assert_eq!(
        RouteTable::builder().route("about", ()).build().unwrap_err(),
        RouteTableError::InvalidPath("about".into())
    );
    assert_eq!(
        RouteTable::builder().route("/a/:", ()).build().unwrap_err(),
        RouteTableError::InvalidPath("/a/:".into())
    );
    assert_eq!(
        RouteTable::builder().route("/a/*", ()).build().unwrap_err(),
        RouteTableError::InvalidPath("/a/*".into())
    );
}

#[test]
fn build_rejects_second_fallback() {
    let err = RouteTable::builder().route("*", ()).route("*", ()).build().unwrap_err();
    assert_eq!(err, RouteTableError::DuplicateFallback);
}

// =============================================================================
// storefront
// =============================================================================

#[test]
fn storefront_table_builds() {
    let table = crate::routes::storefront::storefront().unwrap();
    assert_eq!(*table.resolve("/product/abc").unwrap().component, "ProductDetails");
    assert_eq!(*table.resolve("/unknown").unwrap().component, "NotFound");
    assert_eq!(table.resolve("/checkout").unwrap().requirement, RouteRequirement::Role(RequiredRole::User));
    assert_eq!(table.resolve("/admin/orders").unwrap().requirement, RouteRequirement::Role(RequiredRole::Admin));
    assert_eq!(table.resolve("/cart").unwrap().requirement, RouteRequirement::None);
}
