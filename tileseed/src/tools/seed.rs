use crate::cache::{DirCache, HttpSource};
use crate::config::{LayerConf, ProxyConf, SeedConf, SeedingDefaults, ServicesConf};
use anyhow::{Context, Result, bail, ensure};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tileseed_core::{
	CleanupTask, Layer, NullProgress, ProgressSink, SeederOptions, Source, StdoutProgress, TileCache, TileSeeder,
	cleanup_cache,
};

// a layer group referring to itself would otherwise recurse forever
const MAX_LAYER_NESTING: usize = 8;

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// seed configuration with seeds, views and cleanup tasks
	#[arg()]
	seed_conf: PathBuf,

	/// base configuration with seeding defaults
	#[arg(long = "proxy-conf", short = 'f', value_name = "FILE")]
	proxy_conf: Option<PathBuf>,

	/// services configuration with caches and layers
	#[arg(long = "services-conf", short = 's', value_name = "FILE", default_value = "services.yaml")]
	services_conf: PathBuf,

	/// do not seed, just print what would be done
	#[arg(long = "dry-run", short = 'n')]
	dry_run: bool,
}

#[tokio::main]
pub async fn run(arguments: &Subcommand, quiet: bool) -> Result<()> {
	let proxy = match &arguments.proxy_conf {
		Some(path) => ProxyConf::from_path(path)?,
		None => ProxyConf::default(),
	};
	let services = ServicesConf::from_path(&arguments.services_conf)?;
	let seed_conf = SeedConf::from_path(&arguments.seed_conf)?;

	let progress: Arc<dyn ProgressSink> = if quiet { Arc::new(NullProgress) } else { Arc::new(StdoutProgress) };
	let caches = build_caches(&services, &proxy.seeding)?;
	let now = SystemTime::now();
	let mut failures = 0usize;

	for (layer_name, entry) in &seed_conf.seeds {
		let layer = build_layer(&services, &caches, layer_name, 0)?;
		let remove_before = entry.remove_before.as_ref().map(|r| r.cutoff(now)).transpose()?;
		let seeder = TileSeeder::new(
			&layer,
			remove_before,
			progress.clone(),
			SeederOptions {
				workers: proxy.seeding.worker_count(),
				queue_size: proxy.seeding.queue_size,
				meta_size: (proxy.seeding.meta_size[0], proxy.seeding.meta_size[1]),
				dry_run: arguments.dry_run,
				..SeederOptions::default()
			},
		)?;

		for view_name in &entry.views {
			let view = seed_conf.view(view_name)?;
			let outcome = seeder
				.seed_location(view.bounds()?, view.bbox_srs()?, view.levels()?, &view.srs_filter()?)
				.await;
			if let Err(error) = outcome {
				log::error!("seeding layer {layer_name:?} view {view_name:?} failed: {error:#}");
				failures += 1;
			}
		}
		if remove_before.is_some() {
			seeder.cleanup()?;
		}
	}

	for (task_name, task) in &seed_conf.cleanups {
		log::info!("running cleanup task {task_name:?}");
		let remove_before = task.remove_before.as_ref().map(|r| r.cutoff(now)).transpose()?;
		for layer_name in &task.layers {
			let layer = build_layer(&services, &caches, layer_name, 0)?;
			for cache in layer.caches() {
				let cleanup = CleanupTask {
					remove_before,
					keep_levels: task.keep_levels.clone(),
					keep_coverage: task
						.keep_coverage
						.as_ref()
						.map(|c| c.bounds_in(cache.grid().srs()))
						.transpose()?,
				};
				cleanup_cache(cache.as_ref(), &cleanup, arguments.dry_run, progress.as_ref())?;
			}
		}
	}

	ensure!(failures == 0, "{failures} seed task(s) failed");
	log::info!("finished seeding");
	Ok(())
}

fn build_caches(services: &ServicesConf, defaults: &SeedingDefaults) -> Result<BTreeMap<String, Arc<dyn TileCache>>> {
	let mut caches: BTreeMap<String, Arc<dyn TileCache>> = BTreeMap::new();
	for (name, conf) in &services.caches {
		let meta_size = conf.meta_size.unwrap_or(defaults.meta_size);
		let source = Arc::new(HttpSource::new(conf.source.url.clone()));
		let cache = DirCache::new(
			name,
			conf.tile_grid(),
			(meta_size[0], meta_size[1]),
			&conf.directory,
			&conf.format,
			source,
		)
		.with_context(|| format!("invalid cache {name:?}"))?;
		caches.insert(name.clone(), Arc::new(cache));
	}
	Ok(caches)
}

fn build_layer(
	services: &ServicesConf,
	caches: &BTreeMap<String, Arc<dyn TileCache>>,
	name: &str,
	depth: usize,
) -> Result<Layer> {
	if depth > MAX_LAYER_NESTING {
		bail!("layer {name:?} is nested too deeply");
	}
	match services.layer(name)? {
		LayerConf::Group { layers } => Ok(Layer::Multi(
			layers
				.iter()
				.map(|child| build_layer(services, caches, child, depth + 1))
				.collect::<Result<Vec<_>>>()?,
		)),
		LayerConf::Caches { caches: names } => Ok(Layer::View(
			names
				.iter()
				.map(|cache_name| {
					let cache = caches
						.get(cache_name)
						.with_context(|| format!("layer {name:?} refers to unknown cache {cache_name:?}"))?;
					Ok(Source {
						cache: Some(cache.clone()),
					})
				})
				.collect::<Result<Vec<_>>>()?,
		)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn example_services() -> ServicesConf {
		ServicesConf::from_string(
			r"
caches:
  one:
    grid: geodetic
    directory: ./cache/one
    source:
      url: 'http://localhost/wms?bbox={bbox}'
layers:
  base:
    caches: [one]
  group:
    layers: [base]
  broken:
    caches: [two]
  cyclic:
    layers: [cyclic]
",
		)
		.unwrap()
	}

	#[test]
	fn builds_layer_trees_from_the_registry() {
		let services = example_services();
		let caches = build_caches(&services, &SeedingDefaults::default()).unwrap();
		assert_eq!(caches.len(), 1);

		let layer = build_layer(&services, &caches, "group", 0).unwrap();
		let bound = layer.caches();
		assert_eq!(bound.len(), 1);
		assert_eq!(bound[0].name(), "one");

		assert!(build_layer(&services, &caches, "missing", 0).is_err());
		assert!(build_layer(&services, &caches, "broken", 0).is_err());
		assert!(build_layer(&services, &caches, "cyclic", 0).is_err());
	}
}
