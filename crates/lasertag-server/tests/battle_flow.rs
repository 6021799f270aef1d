mod common;

use lasertag_core::net::messages::{ClientAction, ServerEvent, WinCondition};
use lasertag_core::player::TeamColor;
use lasertag_core::weapons::WeaponKind;
use lasertag_server::config::ServerConfig;

use common::*;

fn sudden_death_config() -> ServerConfig {
    // One life, one-shot kills, no cooldown: a single hit decides the game.
    let mut config = ServerConfig::default();
    config.combat.starting_lives = 1;
    config.combat.fire_cooldown_ms = 0;
    config.combat.weapons.pistol.damage = 100;
    config
}

#[tokio::test]
async fn commander_starts_battle_and_pistol_hit_lands() {
    let server = TestServer::new().await;

    let mut nova = join_lobby(&server, "472", "Nova", "red").await;
    let mut ash = join_lobby(&server, "472", "Ash", "blue").await;

    send_action(&mut nova, &ClientAction::StartBattle).await;
    for stream in [&mut nova, &mut ash] {
        let event = wait_for(stream, |e| matches!(e, ServerEvent::BattleStart { .. })).await;
        if let ServerEvent::BattleStart { players, commander } = event {
            assert_eq!(players.len(), 2);
            assert_eq!(commander.as_deref(), Some("Nova"));
            assert!(players.iter().all(|p| p.health == 100 && p.ammo == 5));
        }
    }

    send_action(
        &mut ash,
        &ClientAction::Fire {
            weapon: WeaponKind::Pistol,
            target_color: TeamColor::Red,
        },
    )
    .await;

    let confirmed = wait_for(&mut ash, |e| {
        matches!(e, ServerEvent::HitConfirmed { .. })
    })
    .await;
    match confirmed {
        ServerEvent::HitConfirmed {
            damage,
            points,
            target,
            hit,
        } => {
            assert!(hit);
            assert_eq!(damage, 25);
            assert_eq!(points, 25);
            assert_eq!(target, "Nova");
        },
        other => panic!("expected HitConfirmed, got {other:?}"),
    }

    let hit = wait_for(&mut nova, |e| matches!(e, ServerEvent::PlayerHit { .. })).await;
    match hit {
        ServerEvent::PlayerHit {
            damage,
            shooter,
            health_remaining,
            lives_remaining,
        } => {
            assert_eq!(damage, 25);
            assert_eq!(shooter, "Ash");
            assert_eq!(health_remaining, 75);
            assert_eq!(lives_remaining, 3);
        },
        other => panic!("expected PlayerHit, got {other:?}"),
    }
}

#[tokio::test]
async fn non_commander_cannot_start_battle() {
    let server = TestServer::new().await;

    let _nova = join_lobby(&server, "472", "Nova", "red").await;
    let mut ash = join_lobby(&server, "472", "Ash", "blue").await;

    send_action(&mut ash, &ClientAction::StartBattle).await;
    let started = try_wait_for(&mut ash, 300, |e| {
        matches!(e, ServerEvent::BattleStart { .. })
    })
    .await;
    assert!(started.is_none(), "non-commander must not start the battle");
}

#[tokio::test]
async fn elimination_ends_game_with_last_one_standing() {
    let server = TestServer::from_config(sudden_death_config()).await;

    let mut nova = join_lobby(&server, "472", "Nova", "red").await;
    let mut ash = join_lobby(&server, "472", "Ash", "blue").await;

    send_action(&mut nova, &ClientAction::StartBattle).await;
    wait_for(&mut ash, |e| matches!(e, ServerEvent::BattleStart { .. })).await;

    send_action(
        &mut ash,
        &ClientAction::Fire {
            weapon: WeaponKind::Pistol,
            target_color: TeamColor::Red,
        },
    )
    .await;

    for stream in [&mut nova, &mut ash] {
        let end = wait_for(stream, |e| matches!(e, ServerEvent::GameEnd { .. })).await;
        match end {
            ServerEvent::GameEnd {
                results,
                winner,
                win_condition,
            } => {
                assert_eq!(winner.as_deref(), Some("Ash"));
                assert_eq!(win_condition, WinCondition::LastOneStanding);
                assert_eq!(results.len(), 2);
                // Ranked by points, the shooter first.
                assert_eq!(results[0].tag, "Ash");
            },
            other => panic!("expected GameEnd, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn purchase_after_earning_points() {
    let mut config = ServerConfig::default();
    config.combat.fire_cooldown_ms = 0;
    config.combat.points_per_hit = 100;
    let server = TestServer::from_config(config).await;

    let mut nova = join_lobby(&server, "472", "Nova", "red").await;
    let mut ash = join_lobby(&server, "472", "Ash", "blue").await;

    send_action(&mut nova, &ClientAction::StartBattle).await;
    wait_for(&mut ash, |e| matches!(e, ServerEvent::BattleStart { .. })).await;

    // Broke players get turned away.
    send_action(
        &mut ash,
        &ClientAction::Purchase {
            item: "rifle".into(),
        },
    )
    .await;
    wait_for(&mut ash, |e| matches!(e, ServerEvent::PurchaseFailed { .. })).await;

    // One hit pays for the rifle.
    send_action(
        &mut ash,
        &ClientAction::Fire {
            weapon: WeaponKind::Pistol,
            target_color: TeamColor::Red,
        },
    )
    .await;
    wait_for(&mut ash, |e| matches!(e, ServerEvent::HitConfirmed { .. })).await;

    send_action(
        &mut ash,
        &ClientAction::Purchase {
            item: "rifle".into(),
        },
    )
    .await;
    let event = wait_for(&mut ash, |e| {
        matches!(e, ServerEvent::PurchaseSuccess { .. })
    })
    .await;
    if let ServerEvent::PurchaseSuccess { item, points } = event {
        assert_eq!(item, "rifle");
        assert_eq!(points, 0);
    }

    // Reload picks up the new weapon's capacity.
    send_action(
        &mut ash,
        &ClientAction::Reload {
            weapon: WeaponKind::Rifle,
        },
    )
    .await;
    let event = wait_for(&mut ash, |e| {
        matches!(e, ServerEvent::ReloadComplete { .. })
    })
    .await;
    if let ServerEvent::ReloadComplete { weapon, ammo } = event {
        assert_eq!(weapon, WeaponKind::Rifle);
        assert_eq!(ammo, 10);
    }
}

#[tokio::test]
async fn leave_action_removes_player_from_roster() {
    let server = TestServer::new().await;

    let mut nova = join_lobby(&server, "472", "Nova", "red").await;
    let mut ash = join_lobby(&server, "472", "Ash", "blue").await;

    send_action(&mut ash, &ClientAction::Leave).await;

    let event = wait_for(&mut nova, |e| matches!(e, ServerEvent::PlayerLeft { .. })).await;
    if let ServerEvent::PlayerLeft { player } = event {
        assert_eq!(player, "Ash");
    }
    let event = wait_for(&mut nova, |e| {
        matches!(e, ServerEvent::LobbyUpdate { players, .. } if players.len() == 1)
    })
    .await;
    if let ServerEvent::LobbyUpdate { commander, .. } = event {
        assert_eq!(commander.as_deref(), Some("Nova"));
    }
}

#[tokio::test]
async fn commander_disconnect_hands_off_to_next_player() {
    let server = TestServer::new().await;

    let nova = join_lobby(&server, "472", "Nova", "red").await;
    let mut ash = join_lobby(&server, "472", "Ash", "blue").await;

    drop(nova);

    let event = wait_for(&mut ash, |e| {
        matches!(
            e,
            ServerEvent::LobbyUpdate { commander: Some(c), .. } if c == "Ash"
        )
    })
    .await;
    if let ServerEvent::LobbyUpdate { players, .. } = event {
        assert_eq!(players.len(), 1);
    }
}

#[tokio::test]
async fn spectator_sees_battle_start_and_game_end() {
    let server = TestServer::from_config(sudden_death_config()).await;

    let mut nova = join_lobby(&server, "472", "Nova", "red").await;
    let mut ash = join_lobby(&server, "472", "Ash", "blue").await;
    let mut spectator = ws_connect(&server.spectator_url("472")).await;
    wait_for(&mut spectator, |e| {
        matches!(e, ServerEvent::SpectatorUpdate { .. })
    })
    .await;

    send_action(&mut nova, &ClientAction::StartBattle).await;
    wait_for(&mut spectator, |e| {
        matches!(e, ServerEvent::BattleStart { .. })
    })
    .await;

    wait_for(&mut ash, |e| matches!(e, ServerEvent::BattleStart { .. })).await;
    send_action(
        &mut ash,
        &ClientAction::Fire {
            weapon: WeaponKind::Pistol,
            target_color: TeamColor::Red,
        },
    )
    .await;

    let end = wait_for(&mut spectator, |e| matches!(e, ServerEvent::GameEnd { .. })).await;
    if let ServerEvent::GameEnd { winner, .. } = end {
        assert_eq!(winner.as_deref(), Some("Ash"));
    }
}
