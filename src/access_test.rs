use super::*;
use crate::session::UserId;

fn loaded(role: Role) -> Session {
    Session { user_id: Some(UserId::from("u1")), role, blocked: false, loaded: true, auth_resolved: true }
}

fn every_session() -> Vec<Session> {
    let mut out = Vec::new();
    for user_id in [None, Some(UserId::from("u1"))] {
        for role in [Role::Guest, Role::User, Role::Admin] {
            for blocked in [false, true] {
                for loaded in [false, true] {
                    for auth_resolved in [false, true] {
                        out.push(Session { user_id: user_id.clone(), role, blocked, loaded, auth_resolved });
                    }
                }
            }
        }
    }
    out
}

const GATED: [RouteRequirement; 2] =
    [RouteRequirement::Role(RequiredRole::User), RouteRequirement::Role(RequiredRole::Admin)];

// =============================================================================
// properties
// =============================================================================

#[test]
fn no_requirement_always_allows() {
    for session in every_session() {
        assert_eq!(decide(&session, RouteRequirement::None), Decision::Allow, "{session:?}");
    }
}

#[test]
fn unloaded_session_never_allowed_on_gated_route() {
    for session in every_session().into_iter().filter(|s| !s.loaded) {
        for requirement in GATED {
            assert!(!decide(&session, requirement).is_allowed(), "{session:?} {requirement:?}");
        }
    }
}

#[test]
fn allow_iff_loaded_matching_role_and_not_blocked() {
    for session in every_session() {
        for requirement in GATED {
            let RouteRequirement::Role(required) = requirement else { unreachable!() };
            let expected = session.loaded && session.role == required.role() && !session.blocked;
            assert_eq!(decide(&session, requirement).is_allowed(), expected, "{session:?} {requirement:?}");
        }
    }
}

#[test]
fn decide_is_deterministic() {
    let session = loaded(Role::User);
    let first = decide(&session, GATED[1]);
    for _ in 0..10 {
        assert_eq!(decide(&session, GATED[1]), first);
    }
}

// =============================================================================
// redirect policy
// =============================================================================

#[test]
fn initial_auth_check_is_pending() {
    let session = Session::default();
    assert_eq!(decide(&session, GATED[0]), Decision::DenyRedirect(RedirectTarget::Pending));
}

#[test]
fn awaiting_first_snapshot_is_pending() {
    let session = Session::pending(UserId::from("u1"));
    assert_eq!(decide(&session, GATED[0]), Decision::DenyRedirect(RedirectTarget::Pending));
}

#[test]
fn signed_out_goes_to_sign_in() {
    let session = Session::signed_out();
    assert_eq!(decide(&session, GATED[0]), Decision::DenyRedirect(RedirectTarget::SignIn));
}

#[test]
fn wrong_role_goes_home() {
    let session = loaded(Role::User);
    assert_eq!(decide(&session, GATED[1]), Decision::DenyRedirect(RedirectTarget::Home));
}

#[test]
fn admin_is_not_a_user_route_role() {
    let session = loaded(Role::Admin);
    assert_eq!(decide(&session, GATED[0]), Decision::DenyRedirect(RedirectTarget::Home));
    assert_eq!(decide(&session, GATED[1]), Decision::Allow);
}

#[test]
fn blocked_goes_to_account_blocked() {
    let mut session = loaded(Role::User);
    session.blocked = true;
    assert_eq!(decide(&session, GATED[0]), Decision::DenyRedirect(RedirectTarget::AccountBlocked));
}

#[test]
fn blocked_outranks_unloaded_and_signed_out() {
    for session in every_session().into_iter().filter(|s| s.blocked) {
        for requirement in GATED {
            assert_eq!(
                decide(&session, requirement),
                Decision::DenyRedirect(RedirectTarget::AccountBlocked),
                "{session:?} {requirement:?}"
            );
        }
    }
}

#[test]
fn evicted_user_goes_to_account_blocked() {
    assert_eq!(decide(&Session::evicted(), GATED[0]), Decision::DenyRedirect(RedirectTarget::AccountBlocked));
    assert_eq!(decide(&Session::evicted(), GATED[1]), Decision::DenyRedirect(RedirectTarget::AccountBlocked));
}

#[test]
fn loaded_guest_without_user_goes_to_sign_in() {
    let session = Session { loaded: true, ..Session::signed_out() };
    assert_eq!(decide(&session, GATED[0]), Decision::DenyRedirect(RedirectTarget::SignIn));
}

// =============================================================================
// RequiredRole / RedirectTarget
// =============================================================================

#[test]
fn required_role_parses_user_and_admin_only() {
    assert_eq!("user".parse::<RequiredRole>(), Ok(RequiredRole::User));
    assert_eq!("admin".parse::<RequiredRole>(), Ok(RequiredRole::Admin));
    assert_eq!("guest".parse::<RequiredRole>(), Err(InvalidRequiredRole("guest".into())));
    assert!("root".parse::<RequiredRole>().is_err());
}

#[test]
fn redirect_paths_follow_destinations() {
    let destinations = Destinations::default();
    assert_eq!(RedirectTarget::Pending.path(&destinations), None);
    assert_eq!(RedirectTarget::SignIn.path(&destinations), Some("/signin"));
    assert_eq!(RedirectTarget::Home.path(&destinations), Some("/"));
    assert_eq!(RedirectTarget::AccountBlocked.path(&destinations), Some("/account-blocked"));
}
