use std::{sync::Arc, time::Duration};

use tracing::{debug, error, info};
use voicecast::{
    AudioApi, Slot,
    audio::AudioSource,
    common::{logger, types::AnyResult},
    configs::Config,
    voice::{SlotRoster, VoiceMainloop, VoicePacket},
};

fn parse_slots(arg: Option<&str>) -> AnyResult<Vec<Slot>> {
    let Some(arg) = arg else {
        return Ok(vec![Slot::new(0)?]);
    };
    arg.split(',')
        .map(|s| Ok(Slot::new(s.trim().parse::<usize>()?)?))
        .collect()
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    let config = Config::load()?;
    logger::init(&config);

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: voicecast <audio-file> [slot,slot,...]");
        std::process::exit(2);
    };
    let slots = parse_slots(args.next().as_deref())?;

    let api = Arc::new(AudioApi::new(&config.audio)?);
    let source = api.decode_file_async(path.clone()).await?;
    info!(
        "Decoded {} ({:.1}s, {} frames)",
        path,
        source.duration().as_secs_f32(),
        source.frame_count().unwrap_or(0)
    );

    let roster = Arc::new(SlotRoster::new());
    let music = api.use_channel("music")?;
    music.set_source(source)?;
    for &slot in &slots {
        roster.connect(slot);
        music.play(slot)?;
    }

    let mainloop = Arc::new(VoiceMainloop::start(
        api.manager().clone(),
        roster,
        &config.mainloop,
    )?);

    let drain_loop = mainloop.clone();
    let drain = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(10));
        let mut transport = |packet: &VoicePacket| -> AnyResult<()> {
            debug!(
                slot = %packet.slot,
                section = packet.section,
                packets = packet.offsets.len(),
                bytes = packet.payload.len(),
                "Unit ready"
            );
            Ok(())
        };
        loop {
            interval.tick().await;
            drain_loop.drain(&mut transport);
        }
    });

    info!(listeners = slots.len(), "Streaming; press Ctrl-C to stop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {e}");
    }

    drain.abort();
    mainloop.shutdown().await;
    api.shutdown();
    info!(dropped = mainloop.dropped(), "Bye");
    Ok(())
}
