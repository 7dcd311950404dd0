#[derive(Eq, Hash, PartialEq, Debug, Clone, Copy)]
pub enum FtpCommand {
    USER,
    PASS,
    AUTH,
    PBSZ,
    PROT,
    TYPE,
    REST,
    PASV,
    PORT,
    RETR,
    STOR,
    APPE,
    NOOP,
    SYST,
    FEAT,
    QUIT,
}

impl FtpCommand {
    pub fn from_str(cmd: &str) -> Option<FtpCommand> {
        match cmd.to_ascii_uppercase().as_str() {
            "USER" => Some(FtpCommand::USER),
            "PASS" => Some(FtpCommand::PASS),
            "AUTH" => Some(FtpCommand::AUTH),
            "PBSZ" => Some(FtpCommand::PBSZ),
            "PROT" => Some(FtpCommand::PROT),
            "TYPE" => Some(FtpCommand::TYPE),
            "REST" => Some(FtpCommand::REST),
            "PASV" => Some(FtpCommand::PASV),
            "PORT" => Some(FtpCommand::PORT),
            "RETR" => Some(FtpCommand::RETR),
            "STOR" => Some(FtpCommand::STOR),
            "APPE" => Some(FtpCommand::APPE),
            "NOOP" => Some(FtpCommand::NOOP),
            "SYST" => Some(FtpCommand::SYST),
            "FEAT" => Some(FtpCommand::FEAT),
            "QUIT" => Some(FtpCommand::QUIT),
            _ => None,
        }
    }

    /// Commands accepted before PASS succeeded.
    pub fn allowed_before_login(&self) -> bool {
        matches!(
            self,
            FtpCommand::USER
                | FtpCommand::PASS
                | FtpCommand::AUTH
                | FtpCommand::PBSZ
                | FtpCommand::PROT
                | FtpCommand::FEAT
                | FtpCommand::SYST
                | FtpCommand::NOOP
                | FtpCommand::QUIT
        )
    }
}

/// Splits a command line into its verb and the (possibly empty) argument.
pub fn split_command(line: &str) -> (&str, &str) {
    let line = line.trim_start();
    match line.split_once(' ') {
        Some((verb, arg)) => (verb, arg.trim()),
        None => (line.trim_end(), ""),
    }
}
