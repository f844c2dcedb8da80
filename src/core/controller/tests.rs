use super::*;
use crate::core::event::AuthorColor;
use crate::core::validation::{StrictSelection, ValidationError};
use crate::core::model::Channel;
use crate::ui::surface::Tone;
use crate::utils::test_utils::{sample_guilds, RecordingRenderer};

fn controller_with(session: Session) -> SessionController {
    SessionController::new(session, Box::new(StrictSelection))
}

fn prompt_label(controller: &SessionController) -> Option<&str> {
    controller.prompt().map(|p| p.label.as_str())
}

/// Walk a fresh controller through password login up to the first login event.
fn logged_in_controller(out: &mut RecordingRenderer) -> SessionController {
    let mut controller = controller_with(Session::default());
    controller.start(out).unwrap();
    controller.handle_input("ann@example.com", out).unwrap();
    controller.handle_input("hunter2", out).unwrap();
    controller.handle_input("n", out).unwrap();
    controller.handle_event(Event::LoginSuccessful, out).unwrap();
    controller
}

/// Logged in, guilds loaded, `Dev` selected, `#random` open.
fn open_random(out: &mut RecordingRenderer) -> SessionController {
    let mut controller = logged_in_controller(out);
    controller.guilds_loaded(sample_guilds(), out).unwrap();
    controller.handle_input("1", out).unwrap();
    let commands = controller.handle_input("#random", out).unwrap();
    assert_eq!(
        commands,
        vec![SessionCommand::Subscribe(ChannelId::from("c-random"))]
    );
    controller
}

#[test]
fn start_without_token_asks_for_email() {
    let mut out = RecordingRenderer::default();
    let mut controller = controller_with(Session::default());
    let commands = controller.start(&mut out).unwrap();
    assert!(commands.is_empty());
    assert_eq!(controller.phase(), Phase::LoggedOut);
    assert_eq!(prompt_label(&controller), Some("Email: "));
}

#[test]
fn start_with_token_logs_in_without_prompting() {
    let mut out = RecordingRenderer::default();
    let mut controller = controller_with(Session::new(Some("tok".into()), true));
    let commands = controller.start(&mut out).unwrap();
    assert_eq!(
        commands,
        vec![SessionCommand::Authenticate(Credentials::Token("tok".into()))]
    );
    assert_eq!(controller.phase(), Phase::LoggingIn);
    assert!(controller.prompt().is_none());
    assert_eq!(out.texts(), vec!["Logging in..."]);
}

#[test]
fn password_login_asks_remember_and_masks_password() {
    let mut out = RecordingRenderer::default();
    let mut controller = controller_with(Session::default());
    controller.start(&mut out).unwrap();
    controller.handle_input("ann@example.com", &mut out).unwrap();

    let prompt = controller.prompt().unwrap();
    assert_eq!(prompt.label, "Password: ");
    assert!(prompt.masked);

    controller.handle_input("hunter2", &mut out).unwrap();
    assert_eq!(
        prompt_label(&controller),
        Some("Automatically login in the future? y/n: ")
    );

    controller.handle_input("maybe", &mut out).unwrap();
    assert_eq!(
        prompt_label(&controller),
        Some("Invalid selection. Please select y/n: ")
    );
    assert_eq!(controller.phase(), Phase::LoggedOut);

    let commands = controller.handle_input("y", &mut out).unwrap();
    assert_eq!(
        commands,
        vec![SessionCommand::Authenticate(Credentials::Password {
            email: "ann@example.com".into(),
            password: "hunter2".into(),
        })]
    );
    assert_eq!(controller.phase(), Phase::LoggingIn);
    assert!(controller.prompt().is_none());
}

#[test]
fn empty_email_is_asked_again() {
    let mut out = RecordingRenderer::default();
    let mut controller = controller_with(Session::default());
    controller.start(&mut out).unwrap();
    let first_id = controller.prompt().unwrap().id;
    controller.handle_input("   ", &mut out).unwrap();
    let prompt = controller.prompt().unwrap();
    assert_eq!(prompt.label, "Email: ");
    assert_ne!(prompt.id, first_id);
}

#[test]
fn auto_login_preference_skips_remember_question() {
    let mut out = RecordingRenderer::default();
    let mut controller = controller_with(Session::new(None, true));
    controller.start(&mut out).unwrap();
    controller.handle_input("ann@example.com", &mut out).unwrap();
    let commands = controller.handle_input("hunter2", &mut out).unwrap();
    assert!(matches!(
        commands.as_slice(),
        [SessionCommand::Authenticate(Credentials::Password { .. })]
    ));

    let commands = controller
        .handle_event(Event::LoginSuccessful, &mut out)
        .unwrap();
    assert_eq!(
        commands,
        vec![
            SessionCommand::PersistCredentials { remember: true },
            SessionCommand::LoadGuilds
        ]
    );
}

#[test]
fn login_success_loads_guilds_and_shows_index() {
    let mut out = RecordingRenderer::default();
    let mut controller = controller_with(Session::default());
    controller.start(&mut out).unwrap();
    controller.handle_input("ann@example.com", &mut out).unwrap();
    controller.handle_input("hunter2", &mut out).unwrap();
    controller.handle_input("n", &mut out).unwrap();

    let commands = controller
        .handle_event(Event::LoginSuccessful, &mut out)
        .unwrap();
    assert_eq!(
        commands,
        vec![
            SessionCommand::PersistCredentials { remember: false },
            SessionCommand::LoadGuilds
        ]
    );
    assert_eq!(controller.phase(), Phase::GuildSelection);
    assert!(controller.prompt().is_none());
    assert!(out.contains("You are logged in."));

    controller.guilds_loaded(sample_guilds(), &mut out).unwrap();
    assert_eq!(
        out.pages.last().unwrap(),
        &vec!["0: General".to_string(), "1: Dev".to_string()]
    );
    assert_eq!(
        out.last_text().as_deref(),
        Some("Select a server by entering the corresponding server number")
    );
    assert_eq!(prompt_label(&controller), Some("> "));
}

#[test]
fn each_recoverable_failure_returns_to_login_prompt() {
    let cases = [
        (Event::LoginMalformedEmail, "Not a well formed email address."),
        (Event::LoginWrongPassword, "Password is incorrect."),
        (Event::LoginCaptchaRequired, "Captcha required."),
    ];
    for (event, expected) in cases {
        let mut out = RecordingRenderer::default();
        let mut controller = controller_with(Session::default());
        controller.start(&mut out).unwrap();
        controller.handle_input("ann", &mut out).unwrap();
        controller.handle_input("pw", &mut out).unwrap();
        controller.handle_input("n", &mut out).unwrap();

        let commands = controller.handle_event(event.clone(), &mut out).unwrap();
        assert!(commands.is_empty(), "{event:?} should not issue commands");
        assert_eq!(controller.phase(), Phase::LoggedOut, "{event:?}");
        assert_eq!(prompt_label(&controller), Some("Email: "));
        assert!(out.contains(expected), "{event:?} should render {expected}");
        let error_line = out.lines.iter().find(|l| l.text() == expected).unwrap();
        assert_eq!(error_line.spans[0].tone, Tone::Error);

        // A late guild snapshot must not sneak the session into guild selection.
        controller.guilds_loaded(sample_guilds(), &mut out).unwrap();
        assert_eq!(controller.phase(), Phase::LoggedOut);
    }
}

#[test]
fn captcha_failure_points_at_web_login() {
    let mut out = RecordingRenderer::default();
    let mut controller = controller_with(Session::new(Some("tok".into()), true));
    controller.start(&mut out).unwrap();
    controller
        .handle_event(Event::LoginCaptchaRequired, &mut out)
        .unwrap();
    assert!(out.contains(WEB_LOGIN_URL));
}

#[test]
fn rejected_token_is_forgotten_and_credentials_requested() {
    let mut out = RecordingRenderer::default();
    let mut controller = controller_with(Session::new(Some("stale".into()), true));
    controller.start(&mut out).unwrap();

    let commands = controller
        .handle_event(Event::LoginTokenRejected, &mut out)
        .unwrap();
    assert_eq!(commands, vec![SessionCommand::ForgetToken]);
    assert_eq!(controller.session().auth_token(), None);
    assert_eq!(controller.phase(), Phase::LoggedOut);
    assert_eq!(prompt_label(&controller), Some("Email: "));
}

#[test]
fn login_events_outside_login_are_ignored() {
    let mut out = RecordingRenderer::default();
    let mut controller = open_random(&mut out);
    out.reset();

    assert!(controller
        .handle_event(Event::LoginWrongPassword, &mut out)
        .unwrap()
        .is_empty());
    assert!(controller
        .handle_event(Event::LoginSuccessful, &mut out)
        .unwrap()
        .is_empty());
    controller
        .handle_event(Event::LoginInProgress, &mut out)
        .unwrap();
    assert_eq!(controller.phase(), Phase::ChannelOpen);
    assert!(out.lines.is_empty());
}

#[test]
fn guild_selection_rejects_out_of_range_without_mutation() {
    let mut out = RecordingRenderer::default();
    let mut controller = logged_in_controller(&mut out);
    controller.guilds_loaded(sample_guilds(), &mut out).unwrap();

    for bad in ["2", "-1", "x", "", "1 2"] {
        let before = controller.prompt().unwrap().id;
        let commands = controller.handle_input(bad, &mut out).unwrap();
        assert!(commands.is_empty());
        assert!(controller.session().current_guild().is_none(), "{bad:?}");
        assert_eq!(controller.phase(), Phase::GuildSelection);
        assert_ne!(controller.prompt().unwrap().id, before);
        assert_eq!(out.lines.last().unwrap().spans[0].tone, Tone::Error);
    }
}

#[test]
fn scenario_dev_random_renders_only_open_channel() {
    let mut out = RecordingRenderer::default();
    let mut controller = logged_in_controller(&mut out);
    controller.guilds_loaded(sample_guilds(), &mut out).unwrap();

    controller.handle_input("1", &mut out).unwrap();
    assert_eq!(
        controller.session().current_guild().map(|g| g.name.as_str()),
        Some("Dev")
    );
    assert_eq!(controller.phase(), Phase::ChannelSelection);
    assert!(out.contains("Connected to Dev"));
    assert_eq!(
        out.pages.last().unwrap(),
        &vec!["#chat".to_string(), "#random".to_string()]
    );
    let completions = &controller.prompt().unwrap().completions;
    assert!(completions.contains(&"#chat".to_string()));
    assert!(completions.contains(&"#random".to_string()));

    controller.handle_input("#random", &mut out).unwrap();
    let session = controller.session();
    assert_eq!(session.current_channel().map(|c| c.name.as_str()), Some("random"));
    assert!(session.channel_open());
    assert_eq!(controller.phase(), Phase::ChannelOpen);

    out.reset();
    controller
        .handle_event(
            Event::MessageReceived(Message::new("c-random", "Ann", "hi")),
            &mut out,
        )
        .unwrap();
    assert_eq!(out.texts(), vec!["Ann: hi"]);

    controller
        .handle_event(
            Event::MessageReceived(Message::new("c-chat", "Bob", "elsewhere")),
            &mut out,
        )
        .unwrap();
    assert_eq!(out.texts(), vec!["Ann: hi"]);
}

#[test]
fn message_author_carries_color_and_content_is_escaped() {
    let mut out = RecordingRenderer::default();
    let mut controller = open_random(&mut out);
    out.reset();

    let message = Message::new("c-random", "Ann", "\x1b[31mred\tline").with_color(0x3498db);
    controller
        .handle_event(Event::MessageReceived(message), &mut out)
        .unwrap();

    let line = &out.lines[0];
    assert_eq!(line.spans[0].text, "Ann");
    assert_eq!(line.spans[0].tone, Tone::Author(AuthorColor(0x3498db)));
    assert_eq!(line.text(), "Ann: [31mred    line");
}

#[test]
fn messages_are_dropped_while_no_channel_is_open() {
    let mut out = RecordingRenderer::default();
    let mut controller = logged_in_controller(&mut out);
    controller.guilds_loaded(sample_guilds(), &mut out).unwrap();
    controller.handle_input("1", &mut out).unwrap();
    out.reset();

    // Channel selection: nothing open yet.
    controller
        .handle_event(
            Event::MessageReceived(Message::new("c-random", "Ann", "too early")),
            &mut out,
        )
        .unwrap();
    assert!(out.lines.is_empty());

    controller.handle_input("#random", &mut out).unwrap();
    controller.handle_input("/channels", &mut out).unwrap();
    assert!(!controller.session().channel_open());
    assert_eq!(controller.phase(), Phase::ChannelSelection);
    out.reset();

    controller
        .handle_event(
            Event::MessageReceived(Message::new("c-random", "Ann", "after close")),
            &mut out,
        )
        .unwrap();
    assert!(out.lines.is_empty());
}

#[test]
fn channel_selection_rejects_without_mutating_current_channel() {
    let mut out = RecordingRenderer::default();
    let mut controller = open_random(&mut out);
    controller.handle_input("/channels", &mut out).unwrap();

    for bad in ["random", "#Random", "#welcome", "#", "chat"] {
        controller.handle_input(bad, &mut out).unwrap();
        assert_eq!(
            controller.session().current_channel().map(|c| c.name.as_str()),
            Some("random"),
            "{bad:?}"
        );
        assert!(!controller.session().channel_open());
        assert_eq!(controller.phase(), Phase::ChannelSelection);
    }

    controller.handle_input("#chat", &mut out).unwrap();
    assert_eq!(
        controller.session().current_channel().map(|c| c.name.as_str()),
        Some("chat")
    );
}

#[test]
fn empty_guild_list_reports_and_keeps_prompt() {
    let mut out = RecordingRenderer::default();
    let mut controller = logged_in_controller(&mut out);
    controller.guilds_loaded(Vec::new(), &mut out).unwrap();
    assert!(out.contains("No servers available."));
    assert_eq!(controller.phase(), Phase::GuildSelection);
    assert!(controller.prompt().is_some());

    controller.handle_input("0", &mut out).unwrap();
    assert!(controller.session().current_guild().is_none());
    assert!(out.contains("There are no servers to select."));

    let commands = controller.handle_input("/guilds", &mut out).unwrap();
    assert_eq!(commands, vec![SessionCommand::LoadGuilds]);
}

#[test]
fn guild_without_text_channels_returns_to_guild_prompt() {
    let mut out = RecordingRenderer::default();
    let mut controller = logged_in_controller(&mut out);
    let guilds = vec![Guild::new("g-empty", "Voice Only"), sample_guilds().remove(1)];
    controller.guilds_loaded(guilds, &mut out).unwrap();

    controller.handle_input("0", &mut out).unwrap();
    assert!(out.contains("No text channels available in Voice Only."));
    assert_eq!(controller.phase(), Phase::GuildSelection);
    assert!(controller.session().current_guild().is_none());

    controller.handle_input("1", &mut out).unwrap();
    assert_eq!(controller.phase(), Phase::ChannelSelection);
}

#[test]
fn vanished_channel_closes_and_reprompts() {
    let mut out = RecordingRenderer::default();
    let mut controller = open_random(&mut out);
    out.reset();

    controller
        .channel_unavailable(&ChannelId::from("c-random"), &mut out)
        .unwrap();
    assert!(out.contains("#random is no longer available."));
    assert_eq!(controller.phase(), Phase::ChannelSelection);
    assert!(!controller.session().channel_open());
    assert!(controller.session().current_channel().is_none());

    // The stale token no longer validates.
    controller.handle_input("#random", &mut out).unwrap();
    assert_eq!(controller.phase(), Phase::ChannelSelection);
    assert_eq!(out.last_text().as_deref(), Some("No channel named #random."));
}

#[test]
fn vanished_last_channel_falls_back_to_guilds() {
    let mut out = RecordingRenderer::default();
    let mut controller = logged_in_controller(&mut out);
    controller.guilds_loaded(sample_guilds(), &mut out).unwrap();
    controller.handle_input("0", &mut out).unwrap();
    controller.handle_input("#welcome", &mut out).unwrap();

    controller
        .channel_unavailable(&ChannelId::from("c-welcome"), &mut out)
        .unwrap();
    assert!(out.contains("No text channels available in General."));
    assert_eq!(controller.phase(), Phase::GuildSelection);
}

#[test]
fn rejection_for_other_channel_is_ignored() {
    let mut out = RecordingRenderer::default();
    let mut controller = open_random(&mut out);
    controller
        .channel_unavailable(&ChannelId::from("c-chat"), &mut out)
        .unwrap();
    assert_eq!(controller.phase(), Phase::ChannelOpen);
    assert!(controller.session().channel_open());
}

#[test]
fn guilds_command_reloads_and_leaves_channel() {
    let mut out = RecordingRenderer::default();
    let mut controller = open_random(&mut out);
    let commands = controller.handle_input("/guilds", &mut out).unwrap();
    assert_eq!(commands, vec![SessionCommand::LoadGuilds]);
    assert_eq!(controller.phase(), Phase::GuildSelection);
    assert!(controller.session().current_guild().is_none());
    assert!(!controller.session().channel_open());
    assert!(controller.prompt().is_none());
    assert!(controller.guilds().is_none());
}

#[test]
fn quit_finishes_the_session() {
    let mut out = RecordingRenderer::default();
    let mut controller = open_random(&mut out);
    let commands = controller.handle_input("/quit", &mut out).unwrap();
    assert_eq!(commands, vec![SessionCommand::Quit]);
    assert!(controller.is_finished());
    assert!(controller.prompt().is_none());
}

#[test]
fn plain_text_in_open_channel_is_not_sent() {
    let mut out = RecordingRenderer::default();
    let mut controller = open_random(&mut out);
    let commands = controller.handle_input("hello there", &mut out).unwrap();
    assert!(commands.is_empty());
    assert!(out.contains("Sending messages is not supported."));
    assert_eq!(controller.phase(), Phase::ChannelOpen);
    assert!(controller.prompt().is_some());
}

#[test]
fn unknown_command_reprompts() {
    let mut out = RecordingRenderer::default();
    let mut controller = open_random(&mut out);
    controller.handle_input("/dance", &mut out).unwrap();
    assert!(out.contains("Unknown command /dance."));
    assert_eq!(controller.phase(), Phase::ChannelOpen);
}

#[test]
fn connection_loss_is_fatal() {
    let mut out = RecordingRenderer::default();
    let mut controller = open_random(&mut out);
    let err = controller
        .handle_event(Event::ConnectionLost("socket closed".into()), &mut out)
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Transport(TransportError::ConnectionLost(_))
    ));
    assert!(controller.is_finished());
}

#[test]
fn remember_token_updates_session() {
    let mut controller = controller_with(Session::default());
    controller.remember_token(Some("fresh".into()), true);
    assert_eq!(controller.session().auth_token(), Some("fresh"));
    assert!(controller.session().auto_login());

    controller.remember_token(Some("ignored".into()), false);
    assert_eq!(controller.session().auth_token(), None);
    assert!(!controller.session().auto_login());
}

struct OneBased;

impl SelectionValidator for OneBased {
    fn guild_index(&self, input: &str, guild_count: usize) -> Result<usize, ValidationError> {
        match input.trim().parse::<usize>() {
            Ok(n) if n >= 1 && n <= guild_count => Ok(n - 1),
            _ => Err(ValidationError::new("pick 1..n")),
        }
    }

    fn channel<'a>(
        &self,
        input: &str,
        channels: &'a [Channel],
    ) -> Result<&'a Channel, ValidationError> {
        StrictSelection.channel(input, channels)
    }
}

#[test]
fn validator_is_pluggable() {
    let mut out = RecordingRenderer::default();
    let mut controller = SessionController::new(Session::new(Some("t".into()), true), Box::new(OneBased));
    controller.start(&mut out).unwrap();
    controller
        .handle_event(Event::LoginSuccessful, &mut out)
        .unwrap();
    controller.guilds_loaded(sample_guilds(), &mut out).unwrap();

    controller.handle_input("0", &mut out).unwrap();
    assert!(out.contains("pick 1..n"));
    controller.handle_input("2", &mut out).unwrap();
    assert_eq!(
        controller.session().current_guild().map(|g| g.name.as_str()),
        Some("Dev")
    );
}
