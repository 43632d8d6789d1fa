use std::env;
use std::path::Path;
use std::process;

use rand::Rng;

use bittorrent_client::config::Cfg;
use bittorrent_client::error::ClientError;
use bittorrent_client::logger::Logger;
use bittorrent_client::metainfo::Metainfo;
use bittorrent_client::{storage, swarm, tracker};

const CONFIG_FILE_PATH: &str = "./config.cfg";

fn main() {
    if let Err(err) = run() {
        eprintln!("{:?}", err);
        process::exit(1);
    }
}

fn run() -> Result<(), ClientError> {
    let arguments: Vec<String> = env::args().collect();
    if arguments.len() != 2 {
        return Err(ClientError::MissingArgument);
    }
    let torrent_path = &arguments[1];

    let cfg = Cfg::load_or_default(CONFIG_FILE_PATH);

    let logger = Logger::new(&cfg.log_directory).unwrap_or_else(|_| Logger::stderr());
    let log = logger.sender();
    log.info(&format!("starting download of {torrent_path}"));

    let metainfo = Metainfo::open(Path::new(torrent_path))?;
    log.info(&format!(
        "parsed metainfo name={} pieces={}",
        metainfo.info.name,
        metainfo.piece_hashes().len()
    ));

    let peer_id = generate_peer_id();
    let response = tracker::fetch_peers(
        &metainfo.announce,
        &metainfo.announce_list,
        &metainfo.info_hash,
        &peer_id,
        cfg.tcp_port,
        metainfo.total_size(),
    )?;
    println!(
        "tracker reported {} peers (complete={} incomplete={})",
        response.peers.len(),
        response.complete,
        response.incomplete
    );
    log.info(&format!("tracker returned {} peers", response.peers.len()));

    let data = swarm::download(&metainfo, response.peers, peer_id, cfg.clone(), log.clone())?;

    storage::save(&cfg.download_directory, &metainfo.info.name, &data)?;
    println!("saved file={}", metainfo.info.name);
    log.info(&format!("saved file={}", metainfo.info.name));

    Ok(())
}

/// Builds a 20-byte peer id with the conventional Azureus-style prefix
/// (`-XX0001-` followed by random bytes) so trackers and peers that parse
/// the id's client signature don't choke on something unrecognizable.
fn generate_peer_id() -> [u8; 20] {
    const PREFIX: &[u8] = b"-RS0001-";
    let mut id = [0u8; 20];
    id[..PREFIX.len()].copy_from_slice(PREFIX);
    rand::thread_rng().fill(&mut id[PREFIX.len()..]);
    id
}
