use std::collections::HashSet;

use crate::models::users::User;
use crate::repositories::UserStore;

/// Deepest upline level that earns a commission.
pub const MAX_UPLINE_DEPTH: usize = 3;

/// Walks the referral chain above `user`, nearest referrer first.
///
/// Each step looks up the user whose `ref_code` equals the current
/// `upline_ref_code`. The walk stops at the first code that resolves to no
/// one, at `MAX_UPLINE_DEPTH`, or as soon as a user would appear twice (a
/// self-referral or a cycle). Stops are not errors.
pub async fn resolve_upline(
    users: &dyn UserStore,
    user: &User,
) -> Result<Vec<User>, anyhow::Error> {
    let mut upline = Vec::with_capacity(MAX_UPLINE_DEPTH);
    let mut visited = HashSet::from([user.id.clone()]);
    let mut next_code = user.upline_ref_code.clone();

    while upline.len() < MAX_UPLINE_DEPTH {
        let Some(code) = next_code.take() else {
            log::debug!("Upline of {} ends at level {}.", user.id, upline.len());
            break;
        };

        let Some(referrer) = users.get_user_by_ref_code(&code).await? else {
            log::info!(
                "Referral code {} above {} resolves to no user, stopping at level {}.",
                code,
                user.id,
                upline.len()
            );
            break;
        };

        if !visited.insert(referrer.id.clone()) {
            log::warn!(
                "Referral cycle through {} detected above {}, stopping at level {}.",
                referrer.id,
                user.id,
                upline.len()
            );
            break;
        }

        next_code = referrer.upline_ref_code.clone();
        upline.push(referrer);
    }

    Ok(upline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{seed_user, Fixture};

    #[tokio::test]
    async fn resolves_three_levels_nearest_first() {
        let fx = Fixture::new();
        let c = seed_user(&fx, "c", None).await;
        let b = seed_user(&fx, "b", Some(&c.ref_code)).await;
        let a = seed_user(&fx, "a", Some(&b.ref_code)).await;
        let root = seed_user(&fx, "root", Some(&a.ref_code)).await;
        let buyer = seed_user(&fx, "buyer", Some(&root.ref_code)).await;

        let upline = resolve_upline(fx.repositories.users.as_ref(), &buyer)
            .await
            .unwrap();

        let names: Vec<&str> = upline.iter().map(|u| u.full_name.as_str()).collect();
        assert_eq!(names, vec!["root", "a", "b"]);
    }

    #[tokio::test]
    async fn stops_at_first_unknown_code() {
        let fx = Fixture::new();
        let a = seed_user(&fx, "a", Some("000000")).await;
        let buyer = seed_user(&fx, "buyer", Some(&a.ref_code)).await;

        let upline = resolve_upline(fx.repositories.users.as_ref(), &buyer)
            .await
            .unwrap();

        assert_eq!(upline.len(), 1);
        assert_eq!(upline[0].id, a.id);
    }

    #[tokio::test]
    async fn empty_when_upline_missing() {
        let fx = Fixture::new();
        let buyer = seed_user(&fx, "buyer", Some("999999")).await;

        let upline = resolve_upline(fx.repositories.users.as_ref(), &buyer)
            .await
            .unwrap();

        assert!(upline.is_empty());
    }

    #[tokio::test]
    async fn stops_on_self_referral() {
        let fx = Fixture::new();
        let buyer = seed_user(&fx, "buyer", None).await;
        fx.set_upline(&buyer.id, &buyer.ref_code);
        let buyer = fx.user(&buyer.id).await;

        let upline = resolve_upline(fx.repositories.users.as_ref(), &buyer)
            .await
            .unwrap();

        assert!(upline.is_empty());
    }

    #[tokio::test]
    async fn stops_on_two_user_cycle() {
        let fx = Fixture::new();
        let a = seed_user(&fx, "a", Some("222222")).await;
        let b = seed_user(&fx, "b", Some(&a.ref_code)).await;
        // a points back at b
        fx.set_upline(&a.id, &b.ref_code);
        let buyer = seed_user(&fx, "buyer", Some(&a.ref_code)).await;

        let upline = resolve_upline(fx.repositories.users.as_ref(), &buyer)
            .await
            .unwrap();

        let names: Vec<&str> = upline.iter().map(|u| u.full_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
