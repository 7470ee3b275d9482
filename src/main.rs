use std::io::{self, Read, Write};

use prost::Message;

fn main() {
    env_logger::init();

    if let Err(error) = fallible_main() {
        eprintln!("{}", error);
        std::process::exit(1);
    }
}

fn fallible_main() -> io::Result<()> {
    let mut buf = Vec::new();
    io::stdin().read_to_end(&mut buf)?;

    let response = protoc_gen_json::generate(&buf).map_err(io::Error::from)?;

    buf.clear();
    response
        .encode(&mut buf)
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error))?;
    io::stdout().write_all(&buf)?;

    Ok(())
}
