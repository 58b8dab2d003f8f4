//! zlib header-block compression with the SPDY preset dictionaries.
//!
//! Header blocks are deflated with SYNC_FLUSH framing against a fixed,
//! version-specific dictionary. Both contexts are stateful across the whole
//! session: every compressed block may back-reference bytes of any earlier
//! block, so one compressor serves all outgoing header blocks (serialised by
//! the session mutex) and one decompressor serves all incoming ones (fed
//! only by the transport thread).

use crate::error::SessionError;
use crate::frames::Version;
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

/// Dictionary for SPDY v2 header blocks, including the terminating NUL that
/// historical implementations count as part of the dictionary.
pub(crate) const DICTIONARY_V2: &[u8] =
    b"optionsgetheadpostputdeletetraceacceptaccept-charsetaccept-encodingaccept-\
      languageauthorizationexpectfromhostif-modified-sinceif-matchif-none-matchi\
      f-rangeif-unmodifiedsincemax-forwardsproxy-authorizationrangerefererteuser\
      -agent10010120020120220320420520630030130230330430530630740040140240340440\
      5406407408409410411412413414415416417500501502503504505accept-rangesageeta\
      glocationproxy-authenticatepublicretry-afterservervarywarningwww-authentic\
      ateallowcontent-basecontent-encodingcache-controlconnectiondatetrailertran\
      sfer-encodingupgradeviawarningcontent-languagecontent-lengthcontent-locati\
      oncontent-md5content-rangecontent-typeetagexpireslast-modifiedset-cookieMo\
      ndayTuesdayWednesdayThursdayFridaySaturdaySundayJanFebMarAprMayJunJulAugSe\
      pOctNovDecchunkedtext/htmlimage/pngimage/jpgimage/gifapplication/xmlapplic\
      ation/xhtmltext/plainpublicmax-agecharset=iso-8859-1utf-8gzipdeflateHTTP/1\
      .1statusversionurl\x00";

/// Dictionary for SPDY v3 header blocks: length-prefixed common header names
/// and tokens followed by a run of common values.
pub(crate) const DICTIONARY_V3: &[u8] =
    b"\x00\x00\x00\x07options\x00\x00\x00\x04head\x00\x00\x00\x04post\
      \x00\x00\x00\x03put\x00\x00\x00\x06delete\x00\x00\x00\x05trace\
      \x00\x00\x00\x06accept\x00\x00\x00\x0eaccept-charset\
      \x00\x00\x00\x0faccept-encoding\x00\x00\x00\x0faccept-language\
      \x00\x00\x00\x0daccept-ranges\x00\x00\x00\x03age\x00\x00\x00\x05allow\
      \x00\x00\x00\x0dauthorization\x00\x00\x00\x0dcache-control\
      \x00\x00\x00\x0aconnection\x00\x00\x00\x0ccontent-base\
      \x00\x00\x00\x10content-encoding\x00\x00\x00\x10content-language\
      \x00\x00\x00\x0econtent-length\x00\x00\x00\x10content-location\
      \x00\x00\x00\x0bcontent-md5\x00\x00\x00\x0dcontent-range\
      \x00\x00\x00\x0ccontent-type\x00\x00\x00\x04date\x00\x00\x00\x04etag\
      \x00\x00\x00\x06expect\x00\x00\x00\x07expires\x00\x00\x00\x04from\
      \x00\x00\x00\x04host\x00\x00\x00\x08if-match\
      \x00\x00\x00\x11if-modified-since\x00\x00\x00\x0dif-none-match\
      \x00\x00\x00\x08if-range\x00\x00\x00\x13if-unmodified-since\
      \x00\x00\x00\x0dlast-modified\x00\x00\x00\x08location\
      \x00\x00\x00\x0cmax-forwards\x00\x00\x00\x06pragma\
      \x00\x00\x00\x12proxy-authenticate\x00\x00\x00\x13proxy-authorization\
      \x00\x00\x00\x05range\x00\x00\x00\x07referer\x00\x00\x00\x0bretry-after\
      \x00\x00\x00\x06server\x00\x00\x00\x02te\x00\x00\x00\x07trailer\
      \x00\x00\x00\x11transfer-encoding\x00\x00\x00\x07upgrade\
      \x00\x00\x00\x0auser-agent\x00\x00\x00\x04vary\x00\x00\x00\x03via\
      \x00\x00\x00\x07warning\x00\x00\x00\x10www-authenticate\
      \x00\x00\x00\x06method\x00\x00\x00\x03get\x00\x00\x00\x06status\
      \x00\x00\x00\x06200 OK\x00\x00\x00\x07version\x00\x00\x00\x08HTTP/1.1\
      \x00\x00\x00\x03url\x00\x00\x00\x06public\x00\x00\x00\x0aset-cookie\
      \x00\x00\x00\x0akeep-alive\x00\x00\x00\x06origin\
      100101201202205206300302303304305306307402405406407408409410411412413414\
      415416417502504505203 Non-Authoritative Information204 No Content301 Mov\
      ed Permanently400 Bad Request401 Unauthorized403 Forbidden404 Not Found5\
      00 Internal Server Error501 Not Implemented503 Service UnavailableJan Fe\
      b Mar Apr May Jun Jul Aug Sept Oct Nov Dec 00:00:00 Mon, Tue, Wed, Thu, \
      Fri, Sat, Sun, GMTchunked,text/html,image/png,image/jpg,image/gif,applic\
      ation/xml,application/xhtml+xml,text/plain,text/javascript,publicprivate\
      max-age=gzip,deflate,sdchcharset=utf-8charset=iso-8859-1,utf-,*,enq=0.";

pub(crate) fn dictionary(version: Version) -> &'static [u8] {
    match version {
        Version::V2 => DICTIONARY_V2,
        Version::V3 => DICTIONARY_V3,
    }
}

/// Stateful deflate context for outgoing header blocks.
///
/// The dictionary is primed once, from the version of the first block
/// compressed; a session never mixes versions on the wire.
pub(crate) struct HeaderCompressor {
    deflate: Compress,
    primed: bool,
}

impl HeaderCompressor {
    pub(crate) fn new() -> Self {
        HeaderCompressor {
            deflate: Compress::new(Compression::default(), true),
            primed: false,
        }
    }

    /// Deflate `input` with a SYNC_FLUSH so the peer can inflate the block
    /// without seeing end-of-stream.
    pub(crate) fn compress(
        &mut self,
        version: Version,
        input: &[u8],
    ) -> Result<Vec<u8>, SessionError> {
        if !self.primed {
            self.deflate
                .set_dictionary(dictionary(version))
                .map_err(|e| SessionError::internal(format!("deflate dictionary: {e}")))?;
            self.primed = true;
        }
        let mut out = Vec::with_capacity(input.len() / 2 + 64);
        let mut offset = 0;
        loop {
            let before = self.deflate.total_in();
            let status = self
                .deflate
                .compress_vec(&input[offset..], &mut out, FlushCompress::Sync)
                .map_err(|e| SessionError::internal(format!("deflate: {e}")))?;
            offset += (self.deflate.total_in() - before) as usize;
            match status {
                Status::Ok | Status::BufError => {
                    // Spare output capacity after a sync flush means the
                    // flush completed; otherwise grow and keep going.
                    if offset >= input.len() && out.len() < out.capacity() {
                        return Ok(out);
                    }
                    out.reserve(out.capacity().max(64));
                }
                Status::StreamEnd => return Ok(out),
            }
        }
    }
}

/// Stateful inflate context for incoming header blocks.
pub(crate) struct HeaderDecompressor {
    inflate: Decompress,
}

impl HeaderDecompressor {
    pub(crate) fn new() -> Self {
        HeaderDecompressor {
            inflate: Decompress::new(true),
        }
    }

    /// Inflate one complete compressed block. The caller must have
    /// accumulated the block in full: SYNC_FLUSH framing never reports
    /// end-of-stream, so completion is detected by input exhaustion only.
    pub(crate) fn decompress(
        &mut self,
        version: Version,
        input: &[u8],
    ) -> Result<Vec<u8>, SessionError> {
        let mut out = Vec::with_capacity(input.len() * 3 + 64);
        let mut offset = 0;
        loop {
            let before = self.inflate.total_in();
            let result =
                self.inflate
                    .decompress_vec(&input[offset..], &mut out, FlushDecompress::Sync);
            offset += (self.inflate.total_in() - before) as usize;
            match result {
                Ok(Status::Ok | Status::BufError) => {
                    if offset >= input.len() && out.len() < out.capacity() {
                        return Ok(out);
                    }
                    out.reserve(out.capacity().max(64));
                }
                Ok(Status::StreamEnd) => return Ok(out),
                Err(e) if e.needs_dictionary().is_some() => {
                    self.inflate
                        .set_dictionary(dictionary(version))
                        .map_err(|e| {
                            SessionError::protocol(format!("inflate dictionary: {e}"))
                        })?;
                }
                Err(e) => {
                    return Err(SessionError::protocol(format!("corrupt header block: {e}")));
                }
            }
        }
    }
}
