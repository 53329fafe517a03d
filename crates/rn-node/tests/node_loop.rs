use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rn_controls::RegState;
use rn_core::ChannelId;
use rn_node::*;

fn heater_channel(id: u32, plant: PlantConfig) -> ChannelConfig {
    ChannelConfig {
        id,
        source: plant,
        prog: ProgConfig {
            period_ms: 1000,
            max_rows: 50,
            clear: false,
            enabled: true,
            initial_state: None,
        },
        regulator: Some(RegulatorConfig {
            mode: "pid".to_string(),
            direction: "heater".to_string(),
            goal: 60.0,
            delta: 0.0,
            kp: 20.0,
            ki: 0.0,
            kd: 0.0,
            integral_limit: None,
            output_min: 0.0,
            output_max: 100.0,
            enabled: true,
            failure_threshold: None,
            initial_state: None,
        }),
    }
}

fn node_config(channels: Vec<ChannelConfig>) -> NodeConfig {
    NodeConfig {
        version: 1,
        cadence_ms: 100,
        failure_threshold: 5,
        store: StoreConfig::Memory,
        channels,
    }
}

#[test]
fn pid_heater_warms_plant_toward_goal() {
    let node = Node::from_config(&node_config(vec![heater_channel(1, PlantConfig::default())])).unwrap();
    let end = node.run_for(Instant::now(), 600);

    let snap = node.snapshot(end);
    let channel = &snap.channels[0];
    let last = channel.last_sample.unwrap().value;
    assert!(last > 40.0, "plant only reached {last}");
    assert!(last < 65.0, "plant overshot to {last}");
    let reg = channel.regulator.as_ref().unwrap();
    assert!(reg.output >= reg.output_min && reg.output <= reg.output_max);
    assert_eq!(reg.failure_count, 0);
}

#[test]
fn onf_cooler_holds_dead_band() {
    let mut channel = heater_channel(
        2,
        PlantConfig {
            ambient: 30.0,
            gain: -0.02,
            time_constant_s: 60.0,
            step_s: 0.1,
            ..PlantConfig::default()
        },
    );
    let reg = channel.regulator.as_mut().unwrap();
    reg.mode = "onf".to_string();
    reg.direction = "cooler".to_string();
    reg.goal = 25.0;
    reg.delta = 1.0;

    let node = Node::from_config(&node_config(vec![channel])).unwrap();
    let start = Instant::now();
    let mut now = node.run_for(start, 300);

    let mut lowest = f64::MAX;
    let mut highest = f64::MIN;
    for _ in 0..300 {
        node.tick(now);
        now += node.cadence();
        let value = node
            .channel(ChannelId::new(2))
            .unwrap()
            .with(|inner| inner.last_sample.map(|s| s.value))
            .unwrap()
            .unwrap();
        lowest = lowest.min(value);
        highest = highest.max(value);
    }
    assert!(lowest > 22.5, "undershoot to {lowest}");
    assert!(highest < 27.5, "overshoot to {highest}");
}

#[test]
fn sensor_outage_forces_safe_output() {
    // Every read fails: the threshold is crossed and the heater is parked at
    // its minimum while the regulator keeps re-initialising.
    let plant = PlantConfig {
        fail_every: Some(1),
        ..PlantConfig::default()
    };
    let node = Node::from_config(&node_config(vec![heater_channel(1, plant)])).unwrap();
    let end = node.run_for(Instant::now(), 40);

    let snap = node.snapshot(end);
    let reg = snap.channels[0].regulator.as_ref().unwrap();
    assert_eq!(reg.output, 0.0);
    assert!(reg.failure_count <= 5);
    assert!(matches!(reg.state, RegState::Busy | RegState::Init));
    // Failed reads never reach the store.
    assert_eq!(node.store().count(ChannelId::new(1)).unwrap(), 0);
}

#[test]
fn jsonl_store_survives_node_restart() {
    let temp_dir = std::env::temp_dir().join("rn_node_loop_jsonl");
    let _ = std::fs::remove_dir_all(&temp_dir);
    let path = temp_dir.join("samples.jsonl");

    let mut config = node_config(vec![heater_channel(1, PlantConfig::default())]);
    config.channels[0].prog.max_rows = 4;
    config.store = StoreConfig::Jsonl {
        path: path.display().to_string(),
    };

    {
        let node = Node::from_config(&config).unwrap();
        node.run_for(Instant::now(), 100);
        node.shutdown();
    }
    assert!(path.exists());

    let node = Node::from_config(&config).unwrap();
    let rows = node.store().rows(ChannelId::new(1)).unwrap();
    assert_eq!(rows.len(), 4);
    assert!(rows.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    // Clearing on start purges what the previous run left behind.
    config.channels[0].prog.clear = true;
    let node = Node::from_config(&config).unwrap();
    node.tick(Instant::now());
    assert_eq!(node.store().count(ChannelId::new(1)).unwrap(), 0);
}

#[test]
fn command_context_runs_beside_control_loop() {
    let mut config = node_config(vec![heater_channel(1, PlantConfig::default())]);
    config.cadence_ms = 1;
    config.channels[0].prog.period_ms = 0;
    let node = Arc::new(Node::from_config(&config).unwrap());
    let stop = Arc::new(AtomicBool::new(false));
    let handle = node.spawn_loop(stop.clone());

    let channel = node.channel(ChannelId::new(1)).unwrap();
    for goal in [40.0, 50.0, 45.0] {
        assert!(channel.with_regulator(|r| r.set_goal(goal)).unwrap());
        std::thread::sleep(Duration::from_millis(5));
        let snap = channel.snapshot(Instant::now()).unwrap();
        assert_eq!(snap.regulator.unwrap().goal, goal);
    }
    assert!(!channel.with_regulator(|r| r.set_mode("bogus")).unwrap());

    stop.store(true, Ordering::Relaxed);
    handle.join().unwrap();
    node.shutdown();

    let snap = node.snapshot(Instant::now());
    assert_eq!(snap.channels[0].regulator_enabled, Some(false));
    assert_eq!(snap.channels[0].regulator.as_ref().unwrap().output, 0.0);
    assert!(node.store().count(ChannelId::new(1)).unwrap() > 0);
}

#[test]
fn snapshot_serialises_for_reporting() {
    let node = Node::from_config(&node_config(vec![heater_channel(1, PlantConfig::default())])).unwrap();
    let end = node.run_for(Instant::now(), 3);
    let json = serde_json::to_value(node.snapshot(end)).unwrap();

    assert_eq!(json["cadence_ms"], 100);
    assert_eq!(json["store"], "memory");
    let channel = &json["channels"][0];
    assert_eq!(channel["id"], 1);
    assert_eq!(channel["prog"]["state"], "RUN");
    assert_eq!(channel["regulator"]["state"], "BUSY");
    assert_eq!(channel["regulator"]["mode"], "pid");
    assert_eq!(channel["regulator"]["direction"], "heater");
    assert_eq!(channel["last_sample"]["outcome"], "OK");
}
