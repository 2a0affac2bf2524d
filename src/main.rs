use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{info, warn, LevelFilter};
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use vek::Vec3;

use stealth_exposure::{
    CostProfile, ExposureConfig, ExposureEngine, ExposureVariant, HazardSphere, HeightField, LivingAllies, Observer,
    ObserverClass, RegionProvider, RegionRegistry, SurfaceLocation, VisibilityModel,
};

const CONFIG_PATH: &str = "exposure.toml";
const FRAMES: u32 = 8;
const TPS: u64 = 30;

fn init_logging() -> Result<()> {
    if Path::new("log4rs.yml").exists() {
        log4rs::init_file("log4rs.yml", Default::default()).context("log4rs.yml 載入失敗")?;
        return Ok(());
    }
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%H:%M:%S)} {h({l})} {t} - {m}{n}")))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info))?;
    log4rs::init_config(config)?;
    Ok(())
}

/// 64x64 的庭院，中間一道 L 形矮牆與一片隱蔽草叢
fn courtyard() -> HeightField {
    let mut field = HeightField::flat(64, 64, Vec3::new(0.0, 0.0, 0.0), 4);
    for z in 20..44 {
        field.set_height(30, z, 28);
    }
    for x in 30..44 {
        field.set_height(x, 44, 28);
    }
    let grass: Vec<(u32, u32)> = (36..42).flat_map(|x| (24..30).map(move |z| (x, z))).collect();
    field.with_stealth_cells(grass)
}

fn main() -> Result<()> {
    init_logging()?;

    let config = if Path::new(CONFIG_PATH).exists() {
        ExposureConfig::load_from_file(CONFIG_PATH)?
    } else {
        warn!("找不到 {}，使用預設設定", CONFIG_PATH);
        ExposureConfig::default()
    };

    let registry = Arc::new(RegionRegistry::new());
    let yard = registry.insert("courtyard", Some(courtyard()));
    let annex = registry.insert(
        "annex",
        Some(HeightField::flat(32, 32, Vec3::new(32.0, 0.0, 0.0), 4)),
    );
    info!("載入 {} 個區域", registry.regions().len());

    let allies = Arc::new(LivingAllies::new(1));
    let engine = ExposureEngine::new(config, registry.clone(), allies)?;
    engine.init()?;

    let guards = vec![
        Observer::new(yard.key, Vec3::new(8.0, 0.3, 16.0), std::f32::consts::FRAC_PI_2)
            .with_exposure_model(VisibilityModel::new(6.0, 0.5, 18.0, 0.75))
            .with_threat_model(VisibilityModel::forward(6.0, 0.6)),
        Observer::new(annex.key, Vec3::new(40.0, 0.3, 8.0), -std::f32::consts::FRAC_PI_2)
            .with_exposure_model(VisibilityModel::new(4.0, 0.5, 14.0, 0.7)),
    ];
    engine.update_observers(ObserverClass::EnemyNpcs, guards);
    engine.update_observers(
        ObserverClass::Player,
        vec![Observer::new(yard.key, Vec3::new(20.0, 0.3, 20.0), 0.0).with_exposure_model(VisibilityModel::circle(12.0))],
    );
    engine.update_hazard_spheres(vec![HazardSphere::new(Vec3::new(12.0, 0.3, 16.0), 1.2)]);

    let frame_time = Duration::from_millis(1000 / TPS);
    for frame in 0..FRAMES {
        let start = Instant::now();
        engine.gather_frame();
        engine.kick_frame()?;
        engine.wait_for_frame();
        let stats = engine.stats();
        info!(
            "幀 {}: 階段 {:?}, 游標 {:?}, 已發布 {}",
            frame, stats.phases, stats.cursors, stats.publishes
        );
        if let Some(rest) = frame_time.checked_sub(start.elapsed()) {
            std::thread::sleep(rest);
        }
    }
    engine.gather_frame();

    let behind_wall = Vec3::new(17.0, 0.3, 16.0);
    let in_open = Vec3::new(12.0, 0.3, 12.0);
    {
        let maps = engine.read_lock();
        for (label, p) in [("牆後", behind_wall), ("空地", in_open)] {
            let sample = maps.query_exposure_avoid_threat(yard.key, p, ExposureVariant::Normal, ObserverClass::EnemyNpcs);
            info!("{} {:?}: {:?}", label, p, sample);
        }

        let path = [
            SurfaceLocation::new(yard.key, Vec3::new(10.0, 0.3, 30.0)),
            SurfaceLocation::new(yard.key, Vec3::new(17.0, 0.3, 30.0)),
            SurfaceLocation::new(yard.key, Vec3::new(17.0, 0.3, 12.0)),
        ];
        info!(
            "路徑曝光 {:.2} 米, 迴避 {:.2} 米, 威脅 {:.2} 米",
            maps.integrate_path_exposure(&path, ExposureVariant::StealthMasked, ObserverClass::EnemyNpcs, 0.05),
            maps.integrate_path_avoid(&path),
            maps.integrate_path_threat(&path, 10.0)
        );
        for profile in CostProfile::ALL {
            let cost: f32 = path
                .windows(2)
                .map(|w| profile.surface_cost(&maps, &w[0], &w[1]))
                .sum();
            info!("{} 代價 {:.2}", profile.name(), cost);
        }
    }

    let ray = engine.ray_query(Vec3::new(8.0, 2.0, 16.0), Vec3::new(20.0, 0.5, 16.0));
    info!("視線 {:?}", ray);

    engine.shutdown();
    Ok(())
}
