use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use interview_client::{
    BotAudioSource, Config, MicrophoneFactory, SessionController, SessionEvent, Speaker,
    SubmissionClient,
};

/// Interactive terminal client for a turn-based AI interview.
#[derive(Debug, Parser)]
#[command(name = "interview", version, about)]
struct Cli {
    /// Config file to load (without extension), e.g. config/interview
    #[arg(long)]
    config: Option<String>,

    /// Override the interview backend base URL
    #[arg(long)]
    server_url: Option<String>,

    /// Directory to save each bot utterance into, for playback
    #[arg(long)]
    audio_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut cfg = match &cli.config {
        Some(path) => Config::load(path)?,
        None if Path::new("config/interview.toml").exists() => Config::load("config/interview")?,
        None => Config::default(),
    };
    if let Some(url) = cli.server_url {
        cfg.server.base_url = url;
    }
    if let Some(dir) = &cli.audio_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating audio directory {}", dir.display()))?;
    }

    info!("interview client targeting {}", cfg.server.base_url);

    let api = Arc::new(SubmissionClient::new(&cfg.server)?);
    let factory = Arc::new(MicrophoneFactory::new(cfg.capture.clone()));
    let (controller, mut events) = SessionController::new(api, factory);
    let controller = Arc::new(controller);

    // Notification sink: render events and save bot audio for playback.
    let sink_controller = Arc::clone(&controller);
    let audio_dir = cli.audio_dir.clone();
    let sink = tokio::spawn(async move {
        let mut question_index = 0usize;
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::Started => println!("Interview started."),
                SessionEvent::BotPrompt { text } => {
                    question_index += 1;
                    println!("Interviewer: {text}");
                    render_bot_audio(&sink_controller, audio_dir.as_deref(), question_index).await;
                }
                SessionEvent::RecordingStarted => {
                    println!("Recording... type 'stop' when you are done.")
                }
                SessionEvent::AnswerSubmitted { transcription } => {
                    println!("You: {transcription}")
                }
                SessionEvent::Failed { message } => println!("Error: {message}"),
                SessionEvent::TornDown => break,
            }
        }
    });

    println!("Commands: start | record | stop | retry | discard | transcript | stats | quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match line.trim() {
            "" => {}
            "start" => {
                if let Err(err) = controller.start().await {
                    error!("{err}");
                }
            }
            "record" => {
                if let Err(err) = controller.begin_recording().await {
                    error!("{err}");
                }
            }
            "stop" => match controller.end_recording().await {
                Ok(()) => controller.wait_for_submission().await,
                Err(err) => error!("{err}"),
            },
            "retry" => match controller.retry().await {
                Ok(()) => controller.wait_for_submission().await,
                Err(err) => error!("{err}"),
            },
            "discard" => {
                if let Err(err) = controller.discard().await {
                    error!("{err}");
                }
            }
            "transcript" => {
                for turn in controller.transcript().await {
                    let who = match turn.speaker {
                        Speaker::Bot => "Interviewer",
                        Speaker::User => "You",
                    };
                    println!("[{}] {}: {}", turn.created_at.format("%H:%M:%S"), who, turn.content);
                }
            }
            "stats" => {
                let stats = controller.stats().await;
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
            "quit" | "exit" => break,
            other => println!("unknown command: {other}"),
        }
    }

    controller.teardown().await;
    sink.await.ok();
    Ok(())
}

async fn render_bot_audio(
    controller: &SessionController,
    audio_dir: Option<&Path>,
    question_index: usize,
) {
    match controller.current_audio().await {
        Some(BotAudioSource::Remote(url)) => println!("  (question audio at {url})"),
        Some(BotAudioSource::Inline { data, mime }) => {
            let Some(dir) = audio_dir else {
                return;
            };
            let ext = extension_for(&mime);
            let path = dir.join(format!("question-{question_index}.{ext}"));
            match std::fs::write(&path, &data) {
                Ok(()) => println!("  (question audio saved to {})", path.display()),
                Err(err) => warn!("could not save question audio: {}", err),
            }
        }
        None => {}
    }
}

fn extension_for(mime: &str) -> &'static str {
    if mime.contains("wav") {
        "wav"
    } else if mime.contains("ogg") {
        "ogg"
    } else if mime.contains("webm") {
        "webm"
    } else {
        "mp3"
    }
}
