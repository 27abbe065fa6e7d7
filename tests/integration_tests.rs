//! Integration tests for the trading server
//!
//! These tests drive the session handler through whole play sequences and
//! run the real server over WebSocket with the headless client.

use assert_approx_eq::assert_approx_eq;
use client::network::{Client, Connection};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use server::clock::ManualClock;
use server::config::{GameConfig, ServerConfig};
use server::economy::standard_catalogs;
use server::galaxy::generate_sectors;
use server::network::Server;
use server::session::{GameSession, Outbound, Recipient};
use server::session_log::MemorySink;
use server::world::World;
use shared::{
    ClientMessage, ConnectionId, Player, PlayerId, PlayerUpdateType, Sector, SectorId,
    ServerMessage, TradingPost, TradingPostType, WireCodec,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::timeout;

/// Builds a session over `sectors`, placing the given posts.
fn session_with(
    mut sectors: BTreeMap<SectorId, Sector>,
    posts: &[(SectorId, TradingPostType)],
    config: GameConfig,
) -> (GameSession, ManualClock) {
    let catalogs = standard_catalogs();
    for (sector_id, post_type) in posts {
        let info = catalogs.trading_post(*post_type).unwrap();
        let sector = sectors.get_mut(sector_id).unwrap();
        sector.name = format!("Sector {} - {}", sector_id, info.name);
        sector.trading_post = Some(TradingPost::new(*post_type, info, 0));
    }

    let clock = ManualClock::new(0);
    let world = World::from_parts(sectors, catalogs, config).unwrap();
    let session = GameSession::new(
        world,
        Box::new(clock.clone()),
        StdRng::seed_from_u64(9),
        Box::new(MemorySink::new()),
    );
    (session, clock)
}

/// 4x4 grid: industrial at 2, StarPort at 5, commercial at 6.
fn grid_session() -> (GameSession, ManualClock) {
    session_with(
        generate_sectors(4, 4).unwrap(),
        &[
            (2, TradingPostType::Industrial),
            (5, TradingPostType::Starport),
            (6, TradingPostType::Commercial),
        ],
        GameConfig::default(),
    )
}

fn join(session: &mut GameSession, connection_id: ConnectionId) -> PlayerId {
    session.handle_connect(connection_id);
    session
        .world()
        .find_player_by_connection(connection_id)
        .unwrap()
}

fn player(session: &GameSession, player_id: &PlayerId) -> Player {
    session.world().player(player_id).cloned().unwrap()
}

fn move_to(session: &mut GameSession, connection_id: ConnectionId, target: SectorId) -> Vec<Outbound> {
    session.handle_message(
        connection_id,
        ClientMessage::MoveTo {
            target_sector_id: target,
        },
    )
}

fn error_of(outbound: &[Outbound]) -> Option<&str> {
    outbound.iter().find_map(|out| match &out.message {
        ServerMessage::Error { message } => Some(message.as_str()),
        _ => None,
    })
}

/// SESSION SCENARIOS
mod session_scenarios {
    use super::*;

    #[test]
    fn scout_moves_to_neighbor() {
        let (mut session, _) = grid_session();
        let id = join(&mut session, 1);

        // Sector 1 neighbors on a 4x4 grid: right 5, down 2
        assert_eq!(session.world().sector(1).unwrap().connections, vec![5, 2]);

        let outbound = move_to(&mut session, 1, 5);
        assert_eq!(outbound.len(), 1);
        assert_eq!(outbound[0].recipient, Recipient::All);

        let p = player(&session, &id);
        assert_eq!(p.current_sector, 5);
        assert_eq!(p.energy, 2400 - 8);
        assert!(session.world().occupancy_consistent());
    }

    #[test]
    fn trading_twice_decays_profit() {
        let (mut session, _) = grid_session();
        let id = join(&mut session, 1);
        move_to(&mut session, 1, 2);

        let mut profits = Vec::new();
        let mut efficiencies = Vec::new();
        for _ in 0..2 {
            match &session.handle_message(1, ClientMessage::Trade)[0].message {
                ServerMessage::TradeResult(data) => {
                    profits.push(data.profit);
                    efficiencies.push(data.new_efficiency);
                }
                other => panic!("expected tradeResult, got {:?}", other),
            }
        }

        assert_eq!(profits, vec![100, 85]);
        assert_approx_eq!(efficiencies[0], 0.85);
        assert_approx_eq!(efficiencies[1], 0.7225);
        assert_eq!(player(&session, &id).credits, 1185);
    }

    #[test]
    fn repeated_trading_bottoms_out_then_recovers() {
        let (mut session, clock) = grid_session();
        join(&mut session, 1);
        move_to(&mut session, 1, 2);

        let mut last = u64::MAX;
        for _ in 0..40 {
            let outbound = session.handle_message(1, ClientMessage::Trade);
            let ServerMessage::TradeResult(data) = &outbound[0].message else {
                panic!("trade rejected: {:?}", outbound);
            };
            assert!(data.profit <= last);
            last = data.profit;
        }
        // round(100 * 0.05)
        assert_eq!(last, 5);

        clock.advance(24 * 60 * 60 * 1000);
        let outbound = session.handle_message(1, ClientMessage::Trade);
        let ServerMessage::TradeResult(data) = &outbound[0].message else {
            panic!("trade rejected: {:?}", outbound);
        };
        assert_eq!(data.profit, 100);
    }

    #[test]
    fn unreachable_sector_is_rejected_without_changes() {
        // 1 - 2    3 (isolated)
        let mut sectors = BTreeMap::new();
        sectors.insert(1, Sector::new(1, 0, 0, vec![2]));
        sectors.insert(2, Sector::new(2, 1, 0, vec![1]));
        sectors.insert(3, Sector::new(3, 5, 5, vec![]));
        let (mut session, _) = session_with(sectors, &[], GameConfig::default());
        let id = join(&mut session, 1);
        let before = player(&session, &id);

        let outbound = move_to(&mut session, 1, 3);
        assert_eq!(outbound.len(), 1);
        assert_eq!(outbound[0].recipient, Recipient::Connection(1));
        assert_eq!(error_of(&outbound), Some("No path to sector 3"));
        assert_eq!(player(&session, &id), before);
        assert!(session.world().sector(1).unwrap().has_player(&id));
    }

    #[test]
    fn cargo_upgrades_stop_at_ship_maximum() {
        let mut config = GameConfig::default();
        config.economy.starting_credits = 1_000_000;
        let (mut session, _) = session_with(
            generate_sectors(3, 3).unwrap(),
            &[(1, TradingPostType::Starport)],
            config,
        );
        let id = join(&mut session, 1);

        let mut costs = Vec::new();
        for _ in 0..3 {
            match &session.handle_message(1, ClientMessage::BuyCargoUpgrade)[0].message {
                ServerMessage::CargoUpgradeResult(data) => costs.push(data.cost),
                other => panic!("expected cargoUpgradeResult, got {:?}", other),
            }
        }
        assert_eq!(costs, vec![1000, 1500, 2250]);

        let credits = player(&session, &id).credits;
        let outbound = session.handle_message(1, ClientMessage::BuyCargoUpgrade);
        assert_eq!(error_of(&outbound), Some("Maximum cargo upgrades reached"));
        assert_eq!(player(&session, &id).credits, credits);
        assert_eq!(player(&session, &id).cargo_upgrades, 3);
    }

    #[test]
    fn upgraded_ship_earns_more() {
        let mut config = GameConfig::default();
        config.economy.starting_credits = 20_000;
        let (mut session, _) = session_with(
            generate_sectors(3, 3).unwrap(),
            &[(1, TradingPostType::Starport), (2, TradingPostType::Industrial)],
            config,
        );
        let id = join(&mut session, 1);

        session.handle_message(
            1,
            ClientMessage::UpgradeShip {
                ship_type: shared::ShipType::Freighter,
            },
        );
        session.handle_message(
            1,
            ClientMessage::BuyUpgrade {
                upgrade_id: "bulk-contracts".to_string(),
            },
        );
        // Freighter bought, bulk contracts unaffordable with what is left
        let p = player(&session, &id);
        assert_eq!(p.ship, shared::ShipType::Freighter);
        assert_eq!(p.credits, 5_000);
        assert!(p.ship_upgrades.is_empty());

        move_to(&mut session, 1, 2);
        match &session.handle_message(1, ClientMessage::Trade)[0].message {
            // Freighter multiplier 2.0
            ServerMessage::TradeResult(data) => assert_eq!(data.profit, 200),
            other => panic!("expected tradeResult, got {:?}", other),
        }
    }

    #[test]
    fn random_walks_keep_invariants() {
        let (mut session, clock) = grid_session();
        let connections: Vec<ConnectionId> = (1..=6).collect();
        for connection_id in &connections {
            join(&mut session, *connection_id);
        }

        let mut rng = StdRng::seed_from_u64(1234);
        let max_energy = session.world().config().energy.max_energy;

        for _ in 0..600 {
            clock.advance(rng.gen_range(0..20_000));
            let connection_id = connections[rng.gen_range(0..connections.len())];
            let message = match rng.gen_range(0..4) {
                0 => ClientMessage::Trade,
                1 => ClientMessage::BuyCargoUpgrade,
                _ => ClientMessage::MoveTo {
                    target_sector_id: rng.gen_range(1..=17),
                },
            };
            session.handle_message(connection_id, message);

            let world = session.world();
            assert!(world.occupancy_consistent());
            assert!(world.players().all(|p| p.energy <= max_energy));
            for post in world.sectors().values().filter_map(|s| s.trading_post.as_ref()) {
                assert!(post.trade_efficiency >= 0.05 - 1e-9);
                assert!(post.trade_efficiency <= 1.0 + 1e-9);
            }
        }
    }

    #[test]
    fn joins_and_leaves_reach_the_right_connections() {
        let (mut session, _) = grid_session();
        join(&mut session, 1);

        let outbound = session.handle_connect(2);
        assert_eq!(outbound[1].recipient, Recipient::AllExcept(2));

        let outbound = session.handle_disconnect(1);
        assert_eq!(outbound.len(), 1);
        match &outbound[0].message {
            ServerMessage::PlayerUpdate(data) => assert_eq!(data.update_type, PlayerUpdateType::Left),
            other => panic!("expected playerUpdate, got {:?}", other),
        }
        assert!(session.handle_disconnect(1).is_empty());
        assert_eq!(session.world().player_count(), 1);
    }
}

/// END-TO-END WEBSOCKET TESTS
mod end_to_end {
    use super::*;

    /// Starts a server on an ephemeral port and returns its URL.
    async fn start_server() -> String {
        let (session, _) = session_with(
            generate_sectors(3, 3).unwrap(),
            &[(2, TradingPostType::Industrial), (5, TradingPostType::Commercial)],
            GameConfig::default(),
        );
        let mut server = Server::with_session("127.0.0.1:0", session, ServerConfig::default())
            .await
            .unwrap();
        let url = format!("ws://{}/", server.local_addr());
        tokio::spawn(async move { server.run().await });
        url
    }

    async fn next_event(connection: &mut Connection) -> ServerMessage {
        timeout(Duration::from_secs(5), connection.recv())
            .await
            .expect("timed out waiting for server")
            .unwrap()
            .expect("connection closed")
    }

    #[tokio::test]
    async fn join_and_move_over_json() {
        let url = start_server().await;
        let mut connection = Connection::connect(&url, WireCodec::Json).await.unwrap();

        let player_id = match next_event(&mut connection).await {
            ServerMessage::PlayerJoined(data) => {
                assert_eq!(data.player.current_sector, 1);
                assert_eq!(data.sectors.len(), 9);
                data.player_id
            }
            other => panic!("expected playerJoined, got {:?}", other),
        };

        connection
            .send(&ClientMessage::MoveTo {
                target_sector_id: 2,
            })
            .await
            .unwrap();

        match next_event(&mut connection).await {
            ServerMessage::PlayerUpdate(data) => {
                assert_eq!(data.update_type, PlayerUpdateType::Moved);
                assert_eq!(data.player.id, player_id);
                assert_eq!(data.player.current_sector, 2);
                assert_eq!(data.player.energy, 2392);
            }
            other => panic!("expected playerUpdate, got {:?}", other),
        }

        connection.send(&ClientMessage::MoveTo { target_sector_id: 99 }).await.unwrap();
        assert_eq!(
            next_event(&mut connection).await,
            ServerMessage::error("Invalid move: sector 99 does not exist")
        );
    }

    #[tokio::test]
    async fn travel_and_trade_over_bincode() {
        let url = start_server().await;
        let mut client = Client::connect(&url, WireCodec::Bincode).await.unwrap();
        client.join().await.unwrap();

        client.travel_to(5).await.unwrap();
        assert_eq!(client.world.current_sector(), Some(5));
        assert!(client.world.trading_post_here());

        let profit = client.trade().await.unwrap();
        assert_eq!(profit, 150);
        assert_eq!(client.world.player.as_ref().unwrap().credits, 1150);
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn other_players_see_joins_and_moves() {
        let url = start_server().await;
        let mut first = Connection::connect(&url, WireCodec::Json).await.unwrap();
        assert!(matches!(
            next_event(&mut first).await,
            ServerMessage::PlayerJoined(_)
        ));

        let mut second = Client::connect(&url, WireCodec::Json).await.unwrap();
        second.join().await.unwrap();

        match next_event(&mut first).await {
            ServerMessage::PlayerUpdate(data) => {
                assert_eq!(data.update_type, PlayerUpdateType::Joined)
            }
            other => panic!("expected playerUpdate, got {:?}", other),
        }

        second.travel_to(4).await.unwrap();
        match next_event(&mut first).await {
            ServerMessage::PlayerUpdate(data) => {
                assert_eq!(data.update_type, PlayerUpdateType::Moved);
                assert_eq!(data.player.current_sector, 4);
            }
            other => panic!("expected playerUpdate, got {:?}", other),
        }

        second.close().await.unwrap();
        match next_event(&mut first).await {
            ServerMessage::PlayerUpdate(data) => {
                assert_eq!(data.update_type, PlayerUpdateType::Left)
            }
            other => panic!("expected playerUpdate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn equipment_outside_starport_is_rejected() {
        let url = start_server().await;
        let mut connection = Connection::connect(&url, WireCodec::Json).await.unwrap();
        next_event(&mut connection).await;

        connection
            .send(&ClientMessage::BuyUpgrade {
                upgrade_id: "market-uplink".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(
            next_event(&mut connection).await,
            ServerMessage::error("Ship upgrades are only available at a StarPort")
        );
    }
}
