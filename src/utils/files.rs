use std::path::Path;

use tokio::{
    fs::File,
    io::{self, AsyncBufReadExt, Lines},
};

/// Read a file from the given path into a list of strings
pub async fn read_file(path: impl AsRef<Path>) -> io::Result<Vec<String>> {
    let mut r = file_reader(path.as_ref()).await?;
    let mut lines = Vec::new();

    while let Some(line) = r.next_line().await? {
        lines.push(line);
    }

    Ok(lines)
}

/// Stream the lines of a file one at a time, for files too large to hold in memory twice
pub async fn file_reader(path: &Path) -> io::Result<Lines<io::BufReader<File>>> {
    let f = File::open(path).await.map_err(|e| {
        io::Error::new(e.kind(), format!("unable to open {}: {}", path.display(), e))
    })?;

    Ok(io::BufReader::new(f).lines())
}
